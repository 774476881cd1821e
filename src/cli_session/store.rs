use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::CliSession;
use crate::auth::error::AuthError;
use crate::kv::KeyValueStore;

/// Storage for CLI sessions and in-progress device flows.
#[async_trait]
pub trait CliSessionStore: Send + Sync {
    /// `None` for a missing or unreadable record.
    async fn get(&self, session_id: &Uuid) -> Result<Option<CliSession>, AuthError>;
    async fn set(&self, session: &CliSession) -> Result<(), AuthError>;
    async fn delete(&self, session_id: &Uuid) -> Result<(), AuthError>;
    /// Binds a fresh session id to `device_code` until `expires_in` elapses.
    async fn create_pending_session(
        &self,
        device_code: &str,
        expires_in: Duration,
    ) -> Result<Uuid, AuthError>;
    async fn get_pending_session(&self, device_code: &str) -> Result<Option<Uuid>, AuthError>;
    /// Stores `session` and drops the pending marker for `device_code`.
    async fn complete_pending_session(
        &self,
        device_code: &str,
        session: &CliSession,
    ) -> Result<(), AuthError>;
}

/// [`CliSessionStore`] over a key-value store.
///
/// Sessions live under `cli-session:{id}`, pending flows under
/// `cli-pending:{device_code}`.
pub struct KeyValueCliSessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueCliSessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn session_key(session_id: &Uuid) -> String {
        format!("cli-session:{session_id}")
    }

    fn pending_key(device_code: &str) -> String {
        format!("cli-pending:{device_code}")
    }
}

#[async_trait]
impl CliSessionStore for KeyValueCliSessionStore {
    async fn get(&self, session_id: &Uuid) -> Result<Option<CliSession>, AuthError> {
        let Some(raw) = self.store.get(&Self::session_key(session_id)).await? else {
            return Ok(None);
        };
        Ok(CliSession::parse(&raw).filter(|session| session.session_id == *session_id))
    }

    async fn set(&self, session: &CliSession) -> Result<(), AuthError> {
        let raw = serde_json::to_string(session)?;
        self.store
            .set(&Self::session_key(&session.session_id), &raw)
            .await
    }

    async fn delete(&self, session_id: &Uuid) -> Result<(), AuthError> {
        self.store.delete(&Self::session_key(session_id)).await
    }

    async fn create_pending_session(
        &self,
        device_code: &str,
        expires_in: Duration,
    ) -> Result<Uuid, AuthError> {
        let session_id = Uuid::new_v4();
        self.store
            .set_with_expiry(
                &Self::pending_key(device_code),
                &session_id.to_string(),
                expires_in,
            )
            .await?;
        Ok(session_id)
    }

    async fn get_pending_session(&self, device_code: &str) -> Result<Option<Uuid>, AuthError> {
        let Some(raw) = self.store.get(&Self::pending_key(device_code)).await? else {
            return Ok(None);
        };
        match Uuid::parse_str(&raw) {
            Ok(session_id) => Ok(Some(session_id)),
            Err(err) => {
                debug!(error = %err, "ignoring malformed pending session");
                Ok(None)
            }
        }
    }

    async fn complete_pending_session(
        &self,
        device_code: &str,
        session: &CliSession,
    ) -> Result<(), AuthError> {
        self.set(session).await?;
        self.store.delete(&Self::pending_key(device_code)).await
    }
}
