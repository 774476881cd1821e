//! Crate-level error type.

use thiserror::Error;

use crate::auth::error::AuthError;
use crate::client::ClientError;

/// Primary error type for docport operations.
#[derive(Error, Debug)]
pub enum DocportError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocportError {
    /// `true` when the user has to sign in (again) to continue.
    pub fn requires_sign_in(&self) -> bool {
        match self {
            Self::Auth(err) => matches!(err, AuthError::Unauthorized(_) | AuthError::NotFound),
            Self::Client(ClientError::Auth(err)) => matches!(err, AuthError::Unauthorized(_)),
            Self::Client(ClientError::Status { status: 401, .. }) => true,
            _ => false,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DocportError>;
