//! Access to the signed-in user of the current request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::error::AuthError;

/// Identity provider a user signed in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AccountProvider {
    #[strum(serialize = "github")]
    #[serde(rename = "github")]
    GitHub,
    MicrosoftEntraId,
    Email,
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: String,
    pub email: Option<String>,
    pub provider: AccountProvider,
}

impl SessionUser {
    pub fn new(user_id: impl Into<String>, provider: AccountProvider) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            provider,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Guests sign in by e-mail and have no provider token of their own.
    pub fn is_guest(&self) -> bool {
        self.provider == AccountProvider::Email
    }
}

/// Resolves the id of the current user.
#[async_trait]
pub trait UserIdReader: Send + Sync {
    /// Fails with [`AuthError::Unauthorized`] when no user is signed in.
    async fn user_id(&self) -> Result<String, AuthError>;
}

/// Resolves the full session of the current user.
#[async_trait]
pub trait SessionReader: Send + Sync {
    async fn session_user(&self) -> Result<SessionUser, AuthError>;
}

/// Session reader bound to one user, or to nobody.
///
/// Used by background jobs and the CLI, where there is no inbound request to
/// read a session from.
#[derive(Debug, Clone, Default)]
pub struct StaticSessionReader {
    user: Option<SessionUser>,
}

impl StaticSessionReader {
    pub fn new(user: SessionUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn anonymous() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl SessionReader for StaticSessionReader {
    async fn session_user(&self) -> Result<SessionUser, AuthError> {
        self.user
            .clone()
            .ok_or_else(|| AuthError::unauthorized("no authenticated session"))
    }
}

#[async_trait]
impl UserIdReader for StaticSessionReader {
    async fn user_id(&self) -> Result<String, AuthError> {
        Ok(self.session_user().await?.user_id)
    }
}
