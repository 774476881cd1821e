//! Configuration system (layered: defaults < config file < env).

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::auth::error::AuthError;
use crate::auth::lock::LockOptions;
use crate::auth::refresher::{EntraOAuthTokenRefresher, GitHubOAuthTokenRefresher};
use crate::auth::transfer::GitHubAppCredentials;
use crate::kv::file::default_docport_dir;

const DEFAULT_GITHUB_API_BASE_URL: &str = "https://api.github.com";
const DEFAULT_GITHUB_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
const DEFAULT_GITHUB_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const DEFAULT_GRAPHQL_URL: &str = "https://docport.dev/api/graphql";

/// Layered configuration for docport.
///
/// Resolution order, later wins:
/// 1. Built-in defaults
/// 2. `config.toml` in the docport home (`$DOCPORT_HOME`, else `~/.docport`)
/// 3. Environment variables, after loading `.env` if present
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DocportConfig {
    pub github_client_id: Option<String>,
    pub github_client_secret: Option<String>,
    pub github_api_base_url: String,
    pub github_device_code_url: String,
    pub github_access_token_url: String,
    pub github_app_id: Option<String>,
    pub github_app_private_key: Option<String>,
    pub github_app_installation_id: Option<u64>,
    pub entra_tenant_id: Option<String>,
    pub entra_client_id: Option<String>,
    pub entra_client_secret: Option<String>,
    pub entra_scope: Option<String>,
    pub azure_devops_base_url: Option<String>,
    pub graphql_url: String,
    pub lock_ttl_secs: u64,
    pub lock_timeout_secs: u64,
    pub lock_retry_interval_ms: u64,
    pub repository_cache_ttl_secs: u64,
    pub home_dir: Option<PathBuf>,
}

impl Default for DocportConfig {
    fn default() -> Self {
        let lock = LockOptions::default();
        Self {
            github_client_id: None,
            github_client_secret: None,
            github_api_base_url: DEFAULT_GITHUB_API_BASE_URL.to_string(),
            github_device_code_url: DEFAULT_GITHUB_DEVICE_CODE_URL.to_string(),
            github_access_token_url: DEFAULT_GITHUB_ACCESS_TOKEN_URL.to_string(),
            github_app_id: None,
            github_app_private_key: None,
            github_app_installation_id: None,
            entra_tenant_id: None,
            entra_client_id: None,
            entra_client_secret: None,
            entra_scope: None,
            azure_devops_base_url: None,
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            lock_ttl_secs: lock.ttl.as_secs(),
            lock_timeout_secs: lock.acquire_timeout.as_secs(),
            lock_retry_interval_ms: lock.retry_interval.as_millis() as u64,
            repository_cache_ttl_secs: 300,
            home_dir: None,
        }
    }
}

impl fmt::Debug for DocportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("DocportConfig")
            .field("github_client_id", &self.github_client_id)
            .field("github_client_secret", &redact(&self.github_client_secret))
            .field("github_api_base_url", &self.github_api_base_url)
            .field("github_app_id", &self.github_app_id)
            .field("github_app_private_key", &redact(&self.github_app_private_key))
            .field("github_app_installation_id", &self.github_app_installation_id)
            .field("entra_tenant_id", &self.entra_tenant_id)
            .field("entra_client_id", &self.entra_client_id)
            .field("entra_client_secret", &redact(&self.entra_client_secret))
            .field("azure_devops_base_url", &self.azure_devops_base_url)
            .field("graphql_url", &self.graphql_url)
            .field("home_dir", &self.home_dir)
            .finish_non_exhaustive()
    }
}

impl DocportConfig {
    /// Load all layers from the process environment and the default file.
    pub fn load() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::from_file(&default_docport_dir().join("config.toml"))?;
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Reads a TOML file; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, AuthError> {
        Ok(toml::from_str(raw)?)
    }

    /// Overrides fields from environment variables resolved by `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_mappings: [(&str, &mut Option<String>); 9] = [
            ("GITHUB_CLIENT_ID", &mut self.github_client_id),
            ("GITHUB_CLIENT_SECRET", &mut self.github_client_secret),
            ("GITHUB_APP_ID", &mut self.github_app_id),
            ("GITHUB_APP_PRIVATE_KEY", &mut self.github_app_private_key),
            ("AZURE_ENTRA_TENANT_ID", &mut self.entra_tenant_id),
            ("AZURE_ENTRA_CLIENT_ID", &mut self.entra_client_id),
            ("AZURE_ENTRA_CLIENT_SECRET", &mut self.entra_client_secret),
            ("AZURE_ENTRA_SCOPE", &mut self.entra_scope),
            ("AZURE_DEVOPS_BASE_URL", &mut self.azure_devops_base_url),
        ];
        for (name, field) in string_mappings {
            if let Some(value) = lookup(name) {
                *field = Some(value);
            }
        }

        if let Some(url) = lookup("GITHUB_API_BASE_URL") {
            self.github_api_base_url = url;
        }
        if let Some(url) = lookup("DOCPORT_GRAPHQL_URL") {
            self.graphql_url = url;
        }
        if let Some(home) = lookup("DOCPORT_HOME") {
            self.home_dir = Some(PathBuf::from(home));
        }

        if let Some(id) = parse_env(&lookup, "GITHUB_APP_INSTALLATION_ID")? {
            self.github_app_installation_id = Some(id);
        }
        let numeric_mappings: [(&str, &mut u64); 4] = [
            ("DOCPORT_LOCK_TTL_SECS", &mut self.lock_ttl_secs),
            ("DOCPORT_LOCK_TIMEOUT_SECS", &mut self.lock_timeout_secs),
            ("DOCPORT_LOCK_RETRY_INTERVAL_MS", &mut self.lock_retry_interval_ms),
            ("DOCPORT_REPOSITORY_CACHE_TTL_SECS", &mut self.repository_cache_ttl_secs),
        ];
        for (name, field) in numeric_mappings {
            if let Some(value) = parse_env(&lookup, name)? {
                *field = value;
            }
        }
        Ok(())
    }

    pub fn home_dir(&self) -> PathBuf {
        self.home_dir.clone().unwrap_or_else(default_docport_dir)
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            ttl: Duration::from_secs(self.lock_ttl_secs),
            acquire_timeout: Duration::from_secs(self.lock_timeout_secs),
            retry_interval: Duration::from_millis(self.lock_retry_interval_ms),
        }
    }

    pub fn repository_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.repository_cache_ttl_secs)
    }

    pub fn require_github_client_id(&self) -> Result<&str, AuthError> {
        self.github_client_id.as_deref().ok_or_else(|| {
            AuthError::Configuration("GITHUB_CLIENT_ID is not set".to_string())
        })
    }

    pub fn github_refresher(&self) -> Result<GitHubOAuthTokenRefresher, AuthError> {
        Ok(GitHubOAuthTokenRefresher::new(
            self.require_github_client_id()?,
            self.github_client_secret.clone(),
        )
        .with_access_token_url(self.github_access_token_url.clone()))
    }

    /// `None` unless all three Entra settings are present.
    pub fn entra_refresher(&self) -> Option<EntraOAuthTokenRefresher> {
        let tenant_id = self.entra_tenant_id.as_deref()?;
        let client_id = self.entra_client_id.clone()?;
        let client_secret = self.entra_client_secret.clone()?;
        let refresher = EntraOAuthTokenRefresher::new(tenant_id, client_id, client_secret);
        Some(match &self.entra_scope {
            Some(scope) => refresher.with_scope(scope.clone()),
            None => refresher,
        })
    }

    /// `None` unless the app id, key, and installation id are all present.
    pub fn github_app_credentials(&self) -> Option<GitHubAppCredentials> {
        Some(GitHubAppCredentials {
            app_id: self.github_app_id.clone()?,
            private_key_pem: self.github_app_private_key.clone()?,
            installation_id: self.github_app_installation_id?,
        })
    }
}

fn parse_env<F>(lookup: &F, name: &str) -> Result<Option<u64>, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|_| {
                AuthError::Configuration(format!("{name} must be a whole number, got {raw:?}"))
            })
        })
        .transpose()
}
