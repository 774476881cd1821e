//! Token repositories: durable leaves plus the wrappers that compose them.
//!
//! Every store implements [`OAuthTokenRepository`], so the wrappers stack:
//! a [`FallbackOAuthTokenRepository`] can put a key-value leaf in front of a
//! [`CompositeOAuthTokenRepository`] of SQL leaves, and so on.

pub mod caching;
pub mod composite;
pub mod fallback;
pub mod key_value;
pub mod memory;
pub mod sql;

pub use caching::{CachingListReader, ListReader};
pub use composite::CompositeOAuthTokenRepository;
pub use fallback::FallbackOAuthTokenRepository;
pub use key_value::KeyValueOAuthTokenRepository;
pub use memory::MemoryOAuthTokenRepository;
pub use sql::{IdentityAccountTokenRepository, SqlOAuthTokenRepository};

use async_trait::async_trait;

use super::error::AuthError;
use super::token::OAuthToken;

/// Storage for one provider's tokens, keyed by user id.
#[async_trait]
pub trait OAuthTokenRepository: Send + Sync {
    /// Fails with [`AuthError::NotFound`] when the user has no token.
    async fn get(&self, user_id: &str) -> Result<OAuthToken, AuthError>;
    async fn set(&self, user_id: &str, token: &OAuthToken) -> Result<(), AuthError>;
    async fn delete(&self, user_id: &str) -> Result<(), AuthError>;
}
