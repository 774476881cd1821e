//! Credential lifecycle: token storage, single-flight acquisition and
//! refresh, and cross-provider transfer.

pub mod access_token;
pub mod error;
pub mod lock;
pub mod persisting;
pub mod refresher;
pub mod repository;
pub mod session;
pub mod source;
pub mod token;
pub mod transfer;

pub use access_token::{AccessTokenProvider, AccessTokenService};
pub use error::AuthError;
pub use lock::{with_lock, KeyValueLockProvider, Lease, LockOptions, LockProvider};
pub use persisting::{PersistingOAuthTokenDataSource, PersistingOAuthTokenRefresher};
pub use refresher::{
    EntraOAuthTokenRefresher, GitHubOAuthTokenRefresher, OAuthTokenRefresher,
    ReissuingOAuthTokenRefresher,
};
pub use repository::{
    CachingListReader, CompositeOAuthTokenRepository, FallbackOAuthTokenRepository,
    IdentityAccountTokenRepository, KeyValueOAuthTokenRepository, ListReader,
    MemoryOAuthTokenRepository, OAuthTokenRepository, SqlOAuthTokenRepository,
};
pub use session::{AccountProvider, SessionReader, SessionUser, StaticSessionReader, UserIdReader};
pub use source::{OAuthTokenDataSource, RepositoryOAuthTokenDataSource};
pub use token::OAuthToken;
pub use transfer::{
    AccountRoutingOAuthTokenDataSource, CredentialsTransferrer, GitHubAppCredentials,
    GitHubAppInstallationTokenIssuer, GitHubOAuthTokenTransferrer, GuestOAuthTokenTransferrer,
    GuestRecord, GuestRepository, HostCredentialsTransferrer, HostRefreshTokenReader,
    InstallationTokenIssuer, KeyValueHostRefreshTokenReader, MemoryGuestRepository,
    SqlGuestRepository, TransferringOAuthTokenDataSource,
};
