use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::KeyValueStore;
use crate::auth::error::AuthError;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map(|at| at > now).unwrap_or(true)
    }
}

/// Process-local store. Expired entries are dropped lazily on access.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Entry>) -> T,
    ) -> Result<T, AuthError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| AuthError::Storage("memory store lock poisoned".to_string()))?;
        let now = Instant::now();
        guard.retain(|_, entry| entry.is_live(now));
        Ok(f(&mut guard))
    }

    fn insert(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), AuthError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        };
        self.with_entries(|entries| {
            entries.insert(key.to_string(), entry);
        })
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
        self.with_entries(|entries| entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError> {
        self.insert(key, value, None)
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        self.insert(key, value, Some(ttl))
    }

    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AuthError> {
        let expires_at = Instant::now().checked_add(ttl);
        self.with_entries(|entries| {
            if entries.contains_key(key) {
                return false;
            }
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at,
                },
            );
            true
        })
    }

    async fn delete(&self, key: &str) -> Result<(), AuthError> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, AuthError> {
        self.with_entries(|entries| match entries.get(key) {
            Some(entry) if entry.value == expected => {
                entries.remove(key);
                true
            }
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_and_get_round_trip() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = MemoryKeyValueStore::new();
        store
            .set_with_expiry("k", "v", Duration::from_secs(5))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(store.get("k").await.unwrap().is_some());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn out_of_range_ttl_keeps_entry_without_expiry() {
        let store = MemoryKeyValueStore::new();
        let forever = Duration::from_secs(u64::MAX);
        store.set_with_expiry("k", "v", forever).await.unwrap();
        assert!(store.set_if_absent_with_expiry("lock", "a", forever).await.unwrap());

        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert_eq!(store.get("lock").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn set_if_absent_respects_live_entries_only() {
        let store = MemoryKeyValueStore::new();
        let ttl = Duration::from_secs(1);
        assert!(store.set_if_absent_with_expiry("k", "a", ttl).await.unwrap());
        assert!(!store.set_if_absent_with_expiry("k", "b", ttl).await.unwrap());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.set_if_absent_with_expiry("k", "b", ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn delete_if_equals_checks_value() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "a").await.unwrap();
        assert!(!store.delete_if_equals("k", "b").await.unwrap());
        assert!(store.delete_if_equals("k", "a").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
    }
}
