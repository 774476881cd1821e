//! Device authorization flow for CLI and headless callers.
//!
//! A flow moves from initiated (a pending marker keyed by device code) to
//! complete (a stored [`CliSession`]). Polling is driven by the caller; the
//! service never schedules its own retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::store::CliSessionStore;
use super::CliSession;
use crate::auth::error::AuthError;
use crate::auth::token::OAuthToken;

/// `None` when `secs` is past what a timestamp can represent; such a session
/// is kept without an expiry.
fn expiry_after(secs: u64) -> Option<DateTime<Utc>> {
    let expires_at = i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl));
    if expires_at.is_none() {
        debug!(expires_in = secs, "token lifetime out of range; storing session without expiry");
    }
    expires_at
}

/// Device and user codes issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCodeGrant {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds until the device code lapses.
    pub expires_in: u64,
    /// Minimum seconds between polls.
    pub interval: u64,
}

/// Outcome of one device code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTokenExchange {
    Authorized {
        token: OAuthToken,
        expires_in: Option<u64>,
    },
    /// The user has not approved yet.
    Pending,
    /// Polling too fast; the caller should lengthen its interval.
    SlowDown,
}

#[async_trait]
pub trait DeviceAuthorizationProvider: Send + Sync {
    async fn request_device_code(&self) -> Result<DeviceCodeGrant, AuthError>;

    /// Pending and slow-down are outcomes; every other provider error is an `Err`.
    async fn exchange_device_code(&self, device_code: &str)
        -> Result<DeviceTokenExchange, AuthError>;
}

/// State of a device flow after one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFlowPoll {
    /// No flow is pending for this device code.
    Unknown,
    Pending,
    SlowDown,
    Complete(CliSession),
}

pub struct DeviceFlowService {
    provider: Arc<dyn DeviceAuthorizationProvider>,
    store: Arc<dyn CliSessionStore>,
}

impl DeviceFlowService {
    pub fn new(
        provider: Arc<dyn DeviceAuthorizationProvider>,
        store: Arc<dyn CliSessionStore>,
    ) -> Self {
        Self { provider, store }
    }

    /// Requests codes and registers a pending session for the device code.
    pub async fn initiate_device_flow(&self) -> Result<DeviceCodeGrant, AuthError> {
        let grant = self.provider.request_device_code().await?;
        let session_id = self
            .store
            .create_pending_session(&grant.device_code, Duration::from_secs(grant.expires_in))
            .await?;
        info!(session_id = %session_id, expires_in = grant.expires_in, "device flow initiated");
        Ok(grant)
    }

    pub async fn poll_device_flow(&self, device_code: &str) -> Result<DeviceFlowPoll, AuthError> {
        let Some(session_id) = self.store.get_pending_session(device_code).await? else {
            debug!("poll for unknown device code");
            return Ok(DeviceFlowPoll::Unknown);
        };

        match self.provider.exchange_device_code(device_code).await? {
            DeviceTokenExchange::Pending => Ok(DeviceFlowPoll::Pending),
            DeviceTokenExchange::SlowDown => Ok(DeviceFlowPoll::SlowDown),
            DeviceTokenExchange::Authorized { token, expires_in } => {
                let mut session = CliSession::new(session_id, token);
                if let Some(expires_at) = expires_in.and_then(expiry_after) {
                    session = session.with_expires_at(expires_at);
                }
                self.store
                    .complete_pending_session(device_code, &session)
                    .await?;
                info!(session_id = %session_id, "device flow complete");
                Ok(DeviceFlowPoll::Complete(session))
            }
        }
    }

    /// `None` while the flow is unknown or not yet authorized.
    pub async fn poll_for_token(&self, device_code: &str) -> Result<Option<CliSession>, AuthError> {
        match self.poll_device_flow(device_code).await? {
            DeviceFlowPoll::Complete(session) => Ok(Some(session)),
            _ => Ok(None),
        }
    }

    pub async fn get_session_token(
        &self,
        session_id: Option<&Uuid>,
    ) -> Result<Option<CliSession>, AuthError> {
        match session_id {
            Some(session_id) => self.store.get(session_id).await,
            None => Ok(None),
        }
    }

    pub async fn sign_out(&self, session_id: &Uuid) -> Result<(), AuthError> {
        info!(session_id = %session_id, "signing out CLI session");
        self.store.delete(session_id).await
    }
}
