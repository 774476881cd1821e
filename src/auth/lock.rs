//! Distributed per-key locks with leases.
//!
//! Several server instances may serve the same user at once, so the lock
//! lives in the shared key-value store rather than in process memory. Every
//! lease expires on its own; a holder that crashes (or whose future is
//! dropped mid-flight) blocks other callers for at most one TTL.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::AuthError;
use crate::kv::KeyValueStore;

/// A granted lock: the key, the holder's opaque token, and when it lapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub key: String,
    pub token: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Waits until the lock is granted or the acquisition timeout elapses.
    async fn acquire(&self, key: &str) -> Result<Lease, AuthError>;
    /// Releases the lease if it is still held by its token.
    async fn release(&self, lease: Lease) -> Result<(), AuthError>;
}

/// Timing knobs for [`KeyValueLockProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub ttl: Duration,
    pub acquire_timeout: Duration,
    pub retry_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_millis(100),
        }
    }
}

/// Lock provider over any [`KeyValueStore`] with atomic set-if-absent.
pub struct KeyValueLockProvider {
    store: Arc<dyn KeyValueStore>,
    options: LockOptions,
}

impl KeyValueLockProvider {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_options(store, LockOptions::default())
    }

    pub fn with_options(store: Arc<dyn KeyValueStore>, options: LockOptions) -> Self {
        Self { store, options }
    }

    fn storage_key(key: &str) -> String {
        format!("lock:{key}")
    }

    fn expires_at(&self) -> DateTime<Utc> {
        let ttl = chrono::Duration::from_std(self.options.ttl).unwrap_or(chrono::Duration::MAX);
        Utc::now().checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[async_trait]
impl LockProvider for KeyValueLockProvider {
    async fn acquire(&self, key: &str) -> Result<Lease, AuthError> {
        let storage_key = Self::storage_key(key);
        let token = Uuid::new_v4();
        let started = Instant::now();
        let deadline = started + self.options.acquire_timeout;

        loop {
            let granted = self
                .store
                .set_if_absent_with_expiry(&storage_key, &token.to_string(), self.options.ttl)
                .await?;
            if granted {
                debug!(key = %key, "lock acquired");
                return Ok(Lease {
                    key: key.to_string(),
                    token,
                    expires_at: self.expires_at(),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(AuthError::LockTimeout {
                    key: key.to_string(),
                    waited_ms: now.duration_since(started).as_millis() as u64,
                });
            }
            tokio::time::sleep(self.options.retry_interval.min(deadline - now)).await;
        }
    }

    async fn release(&self, lease: Lease) -> Result<(), AuthError> {
        let released = self
            .store
            .delete_if_equals(&Self::storage_key(&lease.key), &lease.token.to_string())
            .await?;
        if !released {
            warn!(key = %lease.key, "lease had already expired or changed hands before release");
        }
        Ok(())
    }
}

/// Runs `operation` while holding the lock for `key`.
///
/// The lease is released on every exit path of `operation`, including
/// errors. A failed release is logged, never reported over the operation's
/// own result.
pub async fn with_lock<T, F, Fut>(
    provider: &dyn LockProvider,
    key: &str,
    operation: F,
) -> Result<T, AuthError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, AuthError>>,
{
    let lease = provider.acquire(key).await?;
    let result = operation().await;
    if let Err(err) = provider.release(lease).await {
        warn!(key = %key, error = %err, "failed to release lock");
    }
    result
}
