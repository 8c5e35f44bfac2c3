//! Token Persistence
//!
//! Durable storage backends for the session token triple.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::error::StorageError;
use crate::types::TokenTriple;

/// Persistence backend interface.
///
/// Implementations must store the triple as one unit: a `read` that follows a
/// `write` returns either the old triple or the new one, never a mix.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Read the stored triple, if any.
    async fn read(&self) -> Result<Option<TokenTriple>, StorageError>;

    /// Replace the stored triple.
    async fn write(&self, tokens: &TokenTriple) -> Result<(), StorageError>;

    /// Remove the stored triple. Succeeds when nothing is stored.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory backend; tokens do not survive the process.
#[derive(Default)]
pub struct InMemoryBackend {
    tokens: Mutex<Option<TokenTriple>>,
}

impl InMemoryBackend {
    /// Create empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create backend seeded with tokens (e.g. right after login).
    pub fn with_tokens(tokens: TokenTriple) -> Self {
        Self {
            tokens: Mutex::new(Some(tokens)),
        }
    }
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    async fn read(&self) -> Result<Option<TokenTriple>, StorageError> {
        Ok(self.tokens.lock().clone())
    }

    async fn write(&self, tokens: &TokenTriple) -> Result<(), StorageError> {
        *self.tokens.lock() = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self.tokens.lock() = None;
        Ok(())
    }
}

/// JSON file backend.
///
/// Writes go to a sibling temp file that is then renamed over the target, so a
/// crash mid-write leaves the previous triple intact.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create backend storing tokens at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the token file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    async fn read(&self) -> Result<Option<TokenTriple>, StorageError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "No token file");
                return Ok(None);
            }
            Err(e) => {
                return Err(StorageError::ReadFailed {
                    message: e.to_string(),
                })
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StorageError::CorruptedData {
                message: e.to_string(),
            })
    }

    async fn write(&self, tokens: &TokenTriple) -> Result<(), StorageError> {
        let json = serde_json::to_vec(tokens).map_err(|e| StorageError::WriteFailed {
            message: e.to_string(),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::WriteFailed {
                    message: e.to_string(),
                })?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| StorageError::WriteFailed {
                message: e.to_string(),
            })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&temp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| StorageError::WriteFailed {
                    message: e.to_string(),
                })?;
        }

        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| StorageError::WriteFailed {
                message: e.to_string(),
            })?;

        debug!(path = %self.path.display(), "Token file written");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::ClearFailed {
                message: e.to_string(),
            }),
        }
    }
}

/// Mock backend for testing.
#[derive(Default)]
pub struct MockBackend {
    tokens: Mutex<Option<TokenTriple>>,
    write_history: Mutex<Vec<TokenTriple>>,
    read_count: Mutex<u32>,
    clear_count: Mutex<u32>,
    next_error: Mutex<Option<StorageError>>,
    should_fail: Mutex<bool>,
}

impl MockBackend {
    /// Create new mock backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate tokens.
    pub fn with_tokens(tokens: TokenTriple) -> Self {
        let backend = Self::default();
        *backend.tokens.lock() = Some(tokens);
        backend
    }

    /// Set next error to return.
    pub fn set_next_error(&self, error: StorageError) -> &Self {
        *self.next_error.lock() = Some(error);
        self
    }

    /// Set backend to fail all operations.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *self.should_fail.lock() = should_fail;
        self
    }

    /// Currently stored tokens.
    pub fn stored(&self) -> Option<TokenTriple> {
        self.tokens.lock().clone()
    }

    /// Get write history.
    pub fn get_write_history(&self) -> Vec<TokenTriple> {
        self.write_history.lock().clone()
    }

    /// Number of reads served.
    pub fn read_count(&self) -> u32 {
        *self.read_count.lock()
    }

    /// Number of clears served.
    pub fn clear_count(&self) -> u32 {
        *self.clear_count.lock()
    }

    fn check_error(&self) -> Result<(), StorageError> {
        if *self.should_fail.lock() {
            return Err(StorageError::WriteFailed {
                message: "Mock storage failure".to_string(),
            });
        }

        if let Some(error) = self.next_error.lock().take() {
            return Err(error);
        }

        Ok(())
    }
}

#[async_trait]
impl PersistenceBackend for MockBackend {
    async fn read(&self) -> Result<Option<TokenTriple>, StorageError> {
        self.check_error()?;
        *self.read_count.lock() += 1;
        Ok(self.tokens.lock().clone())
    }

    async fn write(&self, tokens: &TokenTriple) -> Result<(), StorageError> {
        self.check_error()?;
        self.write_history.lock().push(tokens.clone());
        *self.tokens.lock() = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.check_error()?;
        *self.clear_count.lock() += 1;
        *self.tokens.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn create_test_tokens() -> TokenTriple {
        TokenTriple::new(
            "test-access-token",
            "test-refresh-token",
            Utc::now() + Duration::hours(1),
        )
    }

    #[tokio::test]
    async fn test_in_memory_write_read_clear() {
        let backend = InMemoryBackend::new();
        assert!(backend.read().await.unwrap().is_none());

        let tokens = create_test_tokens();
        backend.write(&tokens).await.unwrap();
        assert_eq!(backend.read().await.unwrap(), Some(tokens));

        backend.clear().await.unwrap();
        backend.clear().await.unwrap();
        assert!(backend.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backend_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("nested").join("session.json"));
        assert!(backend.read().await.unwrap().is_none());

        let tokens = create_test_tokens();
        backend.write(&tokens).await.unwrap();
        assert_eq!(backend.read().await.unwrap(), Some(tokens));
        assert!(!backend.temp_path().exists());

        backend.clear().await.unwrap();
        backend.clear().await.unwrap();
        assert!(backend.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backend_rejects_partial_triple() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"access_token":"only-this"}"#).unwrap();

        let backend = FileBackend::new(path);
        let result = backend.read().await;
        assert!(matches!(result, Err(StorageError::CorruptedData { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_backend_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("session.json"));
        backend.write(&create_test_tokens()).await.unwrap();

        let mode = std::fs::metadata(backend.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_mock_backend_failure() {
        let backend = MockBackend::new();
        backend.set_should_fail(true);

        assert!(backend.write(&create_test_tokens()).await.is_err());
        assert!(backend.get_write_history().is_empty());
    }
}
