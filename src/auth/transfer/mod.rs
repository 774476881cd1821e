//! Cross-provider token derivation.
//!
//! A transferrer answers "how do I get a token for provider X from the
//! signed-in session" and writes the result into a destination repository.
//! A destination write that fails after a successful fetch is logged and the
//! fetched token is still returned: the caller can proceed, and the next
//! request simply transfers again.

pub mod github;
pub mod guest;
pub mod host_credentials;
pub mod installation;
pub mod transferring;

pub use github::GitHubOAuthTokenTransferrer;
pub use guest::{
    GuestOAuthTokenTransferrer, GuestRecord, GuestRepository, MemoryGuestRepository,
    SqlGuestRepository,
};
pub use host_credentials::{
    HostCredentialsTransferrer, HostRefreshTokenReader, KeyValueHostRefreshTokenReader,
};
pub use installation::{GitHubAppCredentials, GitHubAppInstallationTokenIssuer, InstallationTokenIssuer};
pub use transferring::TransferringOAuthTokenDataSource;

use std::sync::Arc;

use async_trait::async_trait;

use super::error::AuthError;
use super::session::SessionReader;
use super::source::OAuthTokenDataSource;
use super::token::OAuthToken;

/// Moves a credential held elsewhere into local storage for `user_id`.
#[async_trait]
pub trait CredentialsTransferrer: Send + Sync {
    async fn transfer_credentials(&self, user_id: &str) -> Result<OAuthToken, AuthError>;
}

/// Picks the GitHub or the guest transferrer based on how the user signed in.
pub struct AccountRoutingOAuthTokenDataSource {
    session_reader: Arc<dyn SessionReader>,
    member: Arc<dyn OAuthTokenDataSource>,
    guest: Arc<dyn OAuthTokenDataSource>,
}

impl AccountRoutingOAuthTokenDataSource {
    pub fn new(
        session_reader: Arc<dyn SessionReader>,
        member: Arc<dyn OAuthTokenDataSource>,
        guest: Arc<dyn OAuthTokenDataSource>,
    ) -> Self {
        Self {
            session_reader,
            member,
            guest,
        }
    }
}

#[async_trait]
impl OAuthTokenDataSource for AccountRoutingOAuthTokenDataSource {
    async fn get_oauth_token(&self) -> Result<OAuthToken, AuthError> {
        if self.session_reader.session_user().await?.is_guest() {
            self.guest.get_oauth_token().await
        } else {
            self.member.get_oauth_token().await
        }
    }
}
