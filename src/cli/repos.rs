//! `docport repos`.

use std::sync::Arc;

use super::auth::CliContext;
use crate::client::{CliGraphQLClient, CliSessionTokens};
use crate::error::Result;

/// Handle `docport repos`.
pub async fn handle_repos() -> Result<()> {
    let context = CliContext::load()?;
    let session = context.require_session().await?;
    let tokens = Arc::new(CliSessionTokens::new(
        session,
        context.sessions.clone(),
        Arc::new(context.config.github_refresher()?),
    ));
    let client = CliGraphQLClient::new(tokens, context.config.graphql_url.clone());

    let repositories = client.list_repositories().await?;
    if repositories.is_empty() {
        println!("No repositories");
    }
    for repository in repositories {
        println!("{repository}");
    }
    Ok(())
}
