//! Refresh-and-retry-once around a single API call.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{AuthFailureClassifier, ClientError};
use crate::auth::access_token::AccessTokenProvider;

/// Runs an operation with the current token and, on an auth failure,
/// refreshes once and runs it again.
///
/// At most two attempts are made. The second attempt's result is returned
/// as-is, auth failure or not. Failures the classifier does not recognise
/// propagate without touching the token.
pub struct AuthRetryPolicy {
    tokens: Arc<dyn AccessTokenProvider>,
    classifier: AuthFailureClassifier,
}

impl AuthRetryPolicy {
    pub fn new(tokens: Arc<dyn AccessTokenProvider>, classifier: AuthFailureClassifier) -> Self {
        Self { tokens, classifier }
    }

    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T, ClientError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let token = self.tokens.get_access_token().await?;
        let err = match operation(token.clone()).await {
            Ok(value) => return Ok(value),
            Err(err) if self.classifier.is_auth_failure(&err) => err,
            Err(err) => return Err(err),
        };

        if !self.tokens.can_refresh().await {
            debug!(error = %err, "auth failure with no way to refresh");
            return Err(err);
        }

        warn!(error = %err, "auth failure; refreshing token and retrying once");
        let refreshed = self.tokens.refresh_access_token(&token).await?;
        operation(refreshed).await
    }
}
