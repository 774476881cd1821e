use serde::{Deserialize, Serialize};

/// Access/refresh credential pair scoped to one `(user, provider)`.
///
/// `refresh_token` is `None` for short-lived credentials that cannot be
/// renewed, such as GitHub App installation tokens.
///
/// # Example
/// ```
/// use docport::auth::OAuthToken;
///
/// let token = OAuthToken::new("access", Some("refresh".to_string()));
/// assert!(token.is_refreshable());
/// assert!(!OAuthToken::non_refreshable("installation").is_refreshable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl OAuthToken {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }

    pub fn non_refreshable(access_token: impl Into<String>) -> Self {
        Self::new(access_token, None)
    }

    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.is_some()
    }
}
