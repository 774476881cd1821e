//! Key-value storage backing token caches, CLI sessions, and locks.

pub mod file;
pub mod memory;

pub use file::{FileKeyValueStore, FileStoreConfig};
pub use memory::MemoryKeyValueStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::auth::error::AuthError;

/// Externally-backed key-value store.
///
/// `set_if_absent_with_expiry` and `delete_if_equals` must be atomic with
/// respect to other callers of the same store; the distributed lock relies on
/// both.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration)
        -> Result<(), AuthError>;
    /// Returns `false` when an unexpired value already exists.
    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AuthError>;
    async fn delete(&self, key: &str) -> Result<(), AuthError>;
    /// Deletes the key only if it currently holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, AuthError>;
}
