//! Sessions for headless callers that sign in through the device flow.

pub mod device_flow;
pub mod github;
pub mod store;

pub use device_flow::{
    DeviceAuthorizationProvider, DeviceCodeGrant, DeviceFlowPoll, DeviceFlowService,
    DeviceTokenExchange,
};
pub use github::GitHubDeviceAuthorizationProvider;
pub use store::{CliSessionStore, KeyValueCliSessionStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::auth::token::OAuthToken;

/// Persisted CLI session.
///
/// Serialized as `{sessionId, accessToken, refreshToken?, expiresAt?, createdAt}`
/// with RFC 3339 timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CliSession {
    pub session_id: Uuid,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CliSession {
    pub fn new(session_id: Uuid, token: OAuthToken) -> Self {
        Self {
            session_id,
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn oauth_token(&self) -> OAuthToken {
        OAuthToken::new(self.access_token.clone(), self.refresh_token.clone())
    }

    /// Replaces the token pair after a refresh. The old expiry described the
    /// replaced token, so it is dropped.
    pub fn apply_token(&mut self, token: OAuthToken) {
        self.access_token = token.access_token;
        self.refresh_token = token.refresh_token;
        self.expires_at = None;
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= Utc::now())
    }

    /// Parses a stored record. Anything malformed, including an empty access
    /// token, is reported as no session.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str::<Self>(raw) {
            Ok(session) if !session.access_token.trim().is_empty() => Some(session),
            Ok(_) => {
                debug!("ignoring stored CLI session with empty access token");
                None
            }
            Err(err) => {
                debug!(error = %err, "ignoring malformed CLI session");
                None
            }
        }
    }
}
