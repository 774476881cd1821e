//! Outbound API clients that recover from expired credentials.
//!
//! Every client routes its calls through [`AuthRetryPolicy`]: a call that
//! fails with an auth-classified error is retried exactly once with a
//! refreshed token.

pub mod azure_devops;
pub mod cli;
pub mod github;
pub mod http;
pub mod retry;

pub use azure_devops::{AzureDevOpsClient, AzureRepository};
pub use cli::{CliGraphQLClient, CliSessionTokens};
pub use github::{GitHubClient, GitHubRepository};
pub use retry::AuthRetryPolicy;

use thiserror::Error;

use crate::auth::error::AuthError;

/// Failure of an outbound API call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Redirected ({status}) to {location}")]
    Redirect { status: u16, location: String },

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::Redirect { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}

/// Decides which failures mean "the token is no longer accepted".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthFailureClassifier {
    /// HTTP 401 only.
    #[default]
    Unauthorized,
    /// HTTP 401, or a 302 to the Microsoft sign-in page. Azure DevOps answers
    /// an expired bearer token on some endpoints with that redirect instead
    /// of a 401.
    AzureDevOps,
}

impl AuthFailureClassifier {
    pub fn is_auth_failure(&self, error: &ClientError) -> bool {
        match (self, error) {
            (_, ClientError::Status { status: 401, .. }) => true,
            (Self::AzureDevOps, ClientError::Redirect { status: 302, location }) => {
                is_sign_in_location(location)
            }
            _ => false,
        }
    }
}

fn is_sign_in_location(location: &str) -> bool {
    let location = location.to_ascii_lowercase();
    location.contains("/_signin") || location.contains("login.microsoftonline.com")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redirect(location: &str) -> ClientError {
        ClientError::Redirect {
            status: 302,
            location: location.to_string(),
        }
    }

    #[test]
    fn unauthorized_status_is_auth_failure_everywhere() {
        let err = ClientError::Status {
            status: 401,
            message: String::new(),
        };
        assert!(AuthFailureClassifier::Unauthorized.is_auth_failure(&err));
        assert!(AuthFailureClassifier::AzureDevOps.is_auth_failure(&err));
    }

    #[test]
    fn other_statuses_are_not_auth_failures() {
        for status in [403, 404, 500] {
            let err = ClientError::Status {
                status,
                message: String::new(),
            };
            assert!(!AuthFailureClassifier::AzureDevOps.is_auth_failure(&err));
        }
    }

    #[test]
    fn sign_in_redirect_is_auth_failure_only_for_azure_devops() {
        let err = redirect("https://spsprodweu5.vssps.visualstudio.com/_signin?realm=dev.azure.com");
        assert!(AuthFailureClassifier::AzureDevOps.is_auth_failure(&err));
        assert!(!AuthFailureClassifier::Unauthorized.is_auth_failure(&err));
    }

    #[test]
    fn ordinary_redirect_is_not_auth_failure() {
        let err = redirect("https://dev.azure.com/org/project/_apis/git/repositories/other");
        assert!(!AuthFailureClassifier::AzureDevOps.is_auth_failure(&err));
    }
}
