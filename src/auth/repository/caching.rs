use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::kv::KeyValueStore;

/// Reads a per-user list, such as the repositories a user can see.
#[async_trait]
pub trait ListReader<T: Send + 'static>: Send + Sync {
    async fn read_list(&self, user_id: &str) -> Result<Vec<T>>;
}

/// Caches a [`ListReader`] in a key-value store with a TTL.
///
/// Entries live under `{prefix}:{user_id}`. A cached payload that no longer
/// deserializes counts as a miss. Failing to write the cache is logged and
/// the freshly read list is still returned.
pub struct CachingListReader<T: Send + 'static> {
    inner: Arc<dyn ListReader<T>>,
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl: Duration,
    _item: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> CachingListReader<T> {
    pub fn new(
        inner: Arc<dyn ListReader<T>>,
        store: Arc<dyn KeyValueStore>,
        prefix: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            inner,
            store,
            prefix: prefix.into(),
            ttl,
            _item: PhantomData,
        }
    }

    fn key(&self, user_id: &str) -> String {
        format!("{}:{user_id}", self.prefix)
    }
}

#[async_trait]
impl<T> ListReader<T> for CachingListReader<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn read_list(&self, user_id: &str) -> Result<Vec<T>> {
        let key = self.key(user_id);
        if let Some(raw) = self.store.get(&key).await? {
            match serde_json::from_str::<Vec<T>>(&raw) {
                Ok(items) => return Ok(items),
                Err(err) => debug!(key = %key, error = %err, "discarding unreadable cache entry"),
            }
        }

        let items = self.inner.read_list(user_id).await?;
        match serde_json::to_string(&items) {
            Ok(raw) => {
                if let Err(err) = self.store.set_with_expiry(&key, &raw, self.ttl).await {
                    warn!(key = %key, error = %err, "failed to populate list cache");
                }
            }
            Err(err) => warn!(key = %key, error = %err, "failed to serialize list cache"),
        }
        Ok(items)
    }
}
