//! CLI auth command handlers for login, status, and logout.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use uuid::Uuid;

use super::LoginArgs;
use crate::auth::error::AuthError;
use crate::cli_session::{
    CliSession, DeviceFlowPoll, DeviceFlowService, GitHubDeviceAuthorizationProvider,
    KeyValueCliSessionStore,
};
use crate::config::DocportConfig;
use crate::error::Result;
use crate::kv::{FileKeyValueStore, FileStoreConfig, KeyValueStore};

const CURRENT_SESSION_KEY: &str = "cli-current-session";
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Stores behind the CLI, rooted in the docport home directory.
pub(crate) struct CliContext {
    pub config: DocportConfig,
    pub kv: Arc<dyn KeyValueStore>,
    pub sessions: Arc<KeyValueCliSessionStore>,
}

impl CliContext {
    pub fn load() -> Result<Self> {
        let config = DocportConfig::load()?;
        let kv: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(FileStoreConfig::new(
            config.home_dir().join("store"),
        )));
        let sessions = Arc::new(KeyValueCliSessionStore::new(kv.clone()));
        Ok(Self {
            config,
            kv,
            sessions,
        })
    }

    fn device_flow(&self, scope: Option<&str>) -> Result<DeviceFlowService> {
        let mut github =
            GitHubDeviceAuthorizationProvider::new(self.config.require_github_client_id()?)
                .with_device_code_url(self.config.github_device_code_url.clone())
                .with_access_token_url(self.config.github_access_token_url.clone());
        if let Some(scope) = scope {
            github = github.with_scope(scope);
        }
        Ok(DeviceFlowService::new(Arc::new(github), self.sessions.clone()))
    }

    async fn current_session_id(&self) -> Result<Option<Uuid>> {
        let raw = self.kv.get(CURRENT_SESSION_KEY).await?;
        Ok(raw.and_then(|raw| Uuid::parse_str(&raw).ok()))
    }

    /// The signed-in session, or `Unauthorized` with a hint to log in.
    pub async fn require_session(&self) -> Result<CliSession> {
        let service = self.device_flow(None)?;
        let session_id = self.current_session_id().await?;
        service
            .get_session_token(session_id.as_ref())
            .await?
            .ok_or_else(|| AuthError::unauthorized("not signed in; run `docport auth login`").into())
    }
}

/// Handle `docport auth login`.
pub async fn handle_login(args: &LoginArgs) -> Result<()> {
    let context = CliContext::load()?;
    let service = context.device_flow(args.scope.as_deref())?;
    let grant = service.initiate_device_flow().await?;

    println!("Visit: {}", grant.verification_uri);
    println!("Enter code: {}", grant.user_code);
    println!("Waiting for authorization...");

    let deadline = Instant::now() + Duration::from_secs(grant.expires_in);
    let mut interval = Duration::from_secs(grant.interval.max(1));
    loop {
        tokio::time::sleep(interval).await;
        match service.poll_device_flow(&grant.device_code).await? {
            DeviceFlowPoll::Complete(session) => {
                context
                    .kv
                    .set(CURRENT_SESSION_KEY, &session.session_id.to_string())
                    .await?;
                println!("Signed in (session {}).", session.session_id);
                return Ok(());
            }
            DeviceFlowPoll::Pending => {}
            DeviceFlowPoll::SlowDown => interval += SLOW_DOWN_STEP,
            DeviceFlowPoll::Unknown => {
                return Err(AuthError::unauthorized("device code expired; please try again").into());
            }
        }
        if Instant::now() >= deadline {
            return Err(AuthError::unauthorized("device code expired; please try again").into());
        }
    }
}

/// Handle `docport auth status`.
pub async fn handle_status() -> Result<()> {
    let context = CliContext::load()?;
    match context.require_session().await {
        Ok(session) => {
            println!("Signed in");
            println!("  session:  {}", session.session_id);
            println!("  since:    {}", session.created_at.format("%Y-%m-%d %H:%M"));
            match session.expires_at {
                Some(expires_at) if session.is_expired() => println!(
                    "  token:    expired {} (refreshed on next use)",
                    expires_at.format("%Y-%m-%d %H:%M")
                ),
                Some(expires_at) => {
                    println!("  token:    expires {}", expires_at.format("%Y-%m-%d %H:%M"))
                }
                None => println!("  token:    does not expire"),
            }
            let refresh = if session.refresh_token.is_some() { "yes" } else { "no" };
            println!("  refresh:  {refresh}");
        }
        Err(err) if err.requires_sign_in() => println!("Not signed in"),
        Err(err) => return Err(err),
    }
    Ok(())
}

/// Handle `docport auth logout`.
pub async fn handle_logout() -> Result<()> {
    let context = CliContext::load()?;
    let Some(session_id) = context.current_session_id().await? else {
        println!("Not signed in");
        return Ok(());
    };
    context.device_flow(None)?.sign_out(&session_id).await?;
    context.kv.delete(CURRENT_SESSION_KEY).await?;
    println!("Signed out");
    Ok(())
}
