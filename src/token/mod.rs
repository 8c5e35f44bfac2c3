//! Token Management
//!
//! Ownership and persistence of the session token triple.
//!
//! This module provides:
//!
//! - **Persistence backends**: in-memory, JSON file and mock implementations
//! - **Token store**: the in-memory owner of the current triple
//! - **JWT expiry**: reading `exp` from JWT access tokens (feature `jwt`)

#[cfg(feature = "jwt")]
pub mod jwt;
pub mod storage;
pub mod store;

// Persistence
pub use storage::{FileBackend, InMemoryBackend, MockBackend, PersistenceBackend};

// Store
pub use store::TokenStore;

#[cfg(feature = "jwt")]
pub use jwt::expiry_from_jwt;
