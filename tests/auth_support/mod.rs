#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use docport::auth::{
    AccessTokenService, AccountProvider, AuthError, InstallationTokenIssuer, KeyValueLockProvider,
    LockOptions, MemoryOAuthTokenRepository, OAuthToken, OAuthTokenDataSource,
    OAuthTokenRefresher, OAuthTokenRepository, SessionUser, StaticSessionReader,
};
use docport::kv::MemoryKeyValueStore;

pub const USER_ID: &str = "user-1";

pub fn member() -> Arc<StaticSessionReader> {
    Arc::new(StaticSessionReader::new(SessionUser::new(
        USER_ID,
        AccountProvider::GitHub,
    )))
}

pub fn guest(email: &str) -> Arc<StaticSessionReader> {
    Arc::new(StaticSessionReader::new(
        SessionUser::new(USER_ID, AccountProvider::Email).with_email(email),
    ))
}

pub fn locks() -> Arc<KeyValueLockProvider> {
    Arc::new(KeyValueLockProvider::with_options(
        Arc::new(MemoryKeyValueStore::new()),
        LockOptions {
            retry_interval: Duration::from_millis(1),
            ..LockOptions::default()
        },
    ))
}

pub fn refreshable(access_token: &str) -> OAuthToken {
    OAuthToken::new(access_token, Some(format!("{access_token}-refresh")))
}

/// Producer that counts calls and takes `delay` to answer.
pub struct CountingDataSource {
    pub calls: AtomicUsize,
    token: OAuthToken,
    delay: Duration,
    fail: bool,
}

impl CountingDataSource {
    pub fn new(token: OAuthToken) -> Arc<Self> {
        Self::slow(token, Duration::ZERO)
    }

    pub fn slow(token: OAuthToken, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            token,
            delay,
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            token: OAuthToken::non_refreshable(""),
            delay: Duration::ZERO,
            fail: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthTokenDataSource for CountingDataSource {
    async fn get_oauth_token(&self) -> Result<OAuthToken, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(AuthError::unauthorized("identity provider said no"));
        }
        Ok(self.token.clone())
    }
}

/// Refresher that records the tokens it was asked to refresh.
pub struct CountingRefresher {
    pub seen: Mutex<Vec<OAuthToken>>,
    next: OAuthToken,
}

impl CountingRefresher {
    pub fn new(next: OAuthToken) -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
            next,
        })
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl OAuthTokenRefresher for CountingRefresher {
    async fn refresh_oauth_token(&self, token: &OAuthToken) -> Result<OAuthToken, AuthError> {
        self.seen.lock().unwrap().push(token.clone());
        Ok(self.next.clone())
    }
}

/// Repository that counts every call and can be told to fail.
#[derive(Default)]
pub struct CountingRepository {
    inner: MemoryOAuthTokenRepository,
    pub gets: AtomicUsize,
    pub sets: AtomicUsize,
    pub deletes: AtomicUsize,
    fail_reads: bool,
    fail_writes: bool,
}

impl CountingRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_reads() -> Arc<Self> {
        Arc::new(Self {
            fail_reads: true,
            ..Self::default()
        })
    }

    pub fn failing_writes() -> Arc<Self> {
        Arc::new(Self {
            fail_writes: true,
            ..Self::default()
        })
    }

    pub async fn with_token(token: OAuthToken) -> Arc<Self> {
        let repository = Self::default();
        repository.inner.set(USER_ID, &token).await.unwrap();
        Arc::new(repository)
    }

    /// Reads without touching the counters.
    pub async fn stored(&self) -> Option<OAuthToken> {
        self.inner.get(USER_ID).await.ok()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthTokenRepository for CountingRepository {
    async fn get(&self, user_id: &str) -> Result<OAuthToken, AuthError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads {
            return Err(AuthError::Storage("read refused".to_string()));
        }
        self.inner.get(user_id).await
    }

    async fn set(&self, user_id: &str, token: &OAuthToken) -> Result<(), AuthError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(AuthError::Storage("write refused".to_string()));
        }
        self.inner.set(user_id, token).await
    }

    async fn delete(&self, user_id: &str) -> Result<(), AuthError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(AuthError::Storage("write refused".to_string()));
        }
        self.inner.delete(user_id).await
    }
}

/// Issuer that records each repository list it was asked for.
pub struct RecordingIssuer {
    pub requests: Mutex<Vec<Vec<String>>>,
}

impl RecordingIssuer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl InstallationTokenIssuer for RecordingIssuer {
    async fn issue_installation_token(&self, repositories: &[String]) -> Result<String, AuthError> {
        self.requests.lock().unwrap().push(repositories.to_vec());
        Ok("ghs_installation".to_string())
    }
}

/// Access token service over `repository`, with `producer` on a miss and
/// `refresher` for renewals.
pub fn service(
    repository: Arc<CountingRepository>,
    producer: Arc<dyn OAuthTokenDataSource>,
    refresher: Arc<dyn OAuthTokenRefresher>,
) -> AccessTokenService {
    AccessTokenService::new(member(), repository, producer, refresher, locks(), "github")
}
