//! Token Store
//!
//! In-memory owner of the current token triple, backed by a persistence backend.

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::error::SessionResult;
use crate::token::PersistenceBackend;
use crate::types::TokenTriple;

/// Owns the session's token triple.
///
/// Reads are served from memory. Writes persist the whole triple first and only
/// then replace the in-memory copy with a single assignment, so readers see
/// either the old triple or the new one.
pub struct TokenStore {
    backend: Arc<dyn PersistenceBackend>,
    current: RwLock<Option<TokenTriple>>,
    write_lock: AsyncMutex<()>,
}

impl TokenStore {
    /// Create store seeded from the backend.
    pub async fn load(backend: Arc<dyn PersistenceBackend>) -> SessionResult<Self> {
        let current = backend.read().await?;
        debug!(present = current.is_some(), "Token store loaded");

        Ok(Self {
            backend,
            current: RwLock::new(current),
            write_lock: AsyncMutex::new(()),
        })
    }

    /// Current triple, if a session exists.
    pub fn read(&self) -> Option<TokenTriple> {
        self.current.read().clone()
    }

    /// Persist and adopt a new triple.
    ///
    /// On backend failure the in-memory triple is left unchanged.
    pub async fn write(&self, triple: TokenTriple) -> SessionResult<()> {
        let _guard = self.write_lock.lock().await;

        self.backend.write(&triple).await?;
        debug!(
            token = %triple.fingerprint(),
            expires_at = %triple.expires_at(),
            "Token triple stored"
        );
        *self.current.write() = Some(triple);
        Ok(())
    }

    /// Drop the triple from memory and from the backend. Idempotent.
    ///
    /// Memory is cleared even when the backend fails. The persisted copy then
    /// survives, is reported through the returned error, and comes back on the
    /// next [`load`](Self::load) or [`reload`](Self::reload).
    pub async fn clear(&self) -> SessionResult<()> {
        let _guard = self.write_lock.lock().await;

        let had_tokens = self.current.write().take().is_some();
        if let Err(e) = self.backend.clear().await {
            warn!(error = %e, "Failed to clear persisted tokens");
            return Err(e.into());
        }

        debug!(had_tokens, "Token triple cleared");
        Ok(())
    }

    /// Re-read the backend, e.g. after another process logged in.
    pub async fn reload(&self) -> SessionResult<Option<TokenTriple>> {
        let _guard = self.write_lock.lock().await;

        let current = self.backend.read().await?;
        *self.current.write() = current.clone();
        Ok(current)
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("current", &*self.current.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SessionError, StorageError};
    use crate::token::{InMemoryBackend, MockBackend};
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use mockall::mock;

    mock! {
        pub Persistence {}

        #[async_trait]
        impl PersistenceBackend for Persistence {
            async fn read(&self) -> Result<Option<TokenTriple>, StorageError>;
            async fn write(&self, tokens: &TokenTriple) -> Result<(), StorageError>;
            async fn clear(&self) -> Result<(), StorageError>;
        }
    }

    fn tokens(access: &str) -> TokenTriple {
        TokenTriple::new(access, "refresh", Utc::now() + Duration::hours(1))
    }

    #[tokio::test]
    async fn test_load_seeds_memory() {
        let backend = Arc::new(InMemoryBackend::with_tokens(tokens("seed")));
        let store = TokenStore::load(backend).await.unwrap();
        assert_eq!(store.read().unwrap().access_token(), "seed");
    }

    #[tokio::test]
    async fn test_write_then_clear() {
        let backend = Arc::new(MockBackend::new());
        let store = TokenStore::load(backend.clone()).await.unwrap();
        assert!(store.read().is_none());

        store.write(tokens("new")).await.unwrap();
        assert_eq!(store.read().unwrap().access_token(), "new");
        assert_eq!(backend.get_write_history().len(), 1);

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(store.read().is_none());
        assert!(backend.stored().is_none());
        assert_eq!(backend.clear_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_previous_triple() {
        let mut backend = MockPersistence::new();
        backend.expect_read().returning(|| Ok(Some(tokens("old"))));
        backend.expect_write().times(1).returning(|_| {
            Err(StorageError::WriteFailed {
                message: "disk full".to_string(),
            })
        });

        let store = TokenStore::load(Arc::new(backend)).await.unwrap();
        let result = store.write(tokens("new")).await;

        assert!(matches!(result, Err(SessionError::Storage(StorageError::WriteFailed { .. }))));
        assert_eq!(store.read().unwrap().access_token(), "old");
    }

    #[tokio::test]
    async fn test_failed_backend_clear_still_drops_memory() {
        let mut backend = MockPersistence::new();
        backend.expect_read().returning(|| Ok(Some(tokens("old"))));
        backend.expect_clear().times(1).returning(|| {
            Err(StorageError::WriteFailed {
                message: "read-only filesystem".to_string(),
            })
        });

        let store = TokenStore::load(Arc::new(backend)).await.unwrap();
        let result = store.clear().await;

        assert!(matches!(result, Err(SessionError::Storage(StorageError::WriteFailed { .. }))));
        assert!(store.read().is_none());
    }

    #[tokio::test]
    async fn test_load_propagates_backend_error() {
        let mut backend = MockPersistence::new();
        backend.expect_read().returning(|| {
            Err(StorageError::CorruptedData {
                message: "truncated".to_string(),
            })
        });

        let result = TokenStore::load(Arc::new(backend)).await;
        assert!(matches!(result, Err(SessionError::Storage(StorageError::CorruptedData { .. }))));
    }
}
