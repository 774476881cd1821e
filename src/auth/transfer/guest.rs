//! Tokens for guests who sign in by e-mail and have no GitHub account.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use super::installation::InstallationTokenIssuer;
use crate::auth::error::AuthError;
use crate::auth::persisting::persist_best_effort;
use crate::auth::repository::OAuthTokenRepository;
use crate::auth::session::SessionReader;
use crate::auth::source::OAuthTokenDataSource;
use crate::auth::token::OAuthToken;

/// A guest and the projects they were invited to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRecord {
    pub email: String,
    pub projects: Vec<String>,
}

#[async_trait]
pub trait GuestRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<GuestRecord>, AuthError>;
}

#[derive(Debug, Default)]
pub struct MemoryGuestRepository {
    guests: Mutex<HashMap<String, GuestRecord>>,
}

impl MemoryGuestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: GuestRecord) -> Result<(), AuthError> {
        self.guests
            .lock()
            .map_err(|_| AuthError::Storage("guest map lock poisoned".to_string()))?
            .insert(record.email.clone(), record);
        Ok(())
    }
}

#[async_trait]
impl GuestRepository for MemoryGuestRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<GuestRecord>, AuthError> {
        let guests = self
            .guests
            .lock()
            .map_err(|_| AuthError::Storage("guest map lock poisoned".to_string()))?;
        Ok(guests.get(email).cloned())
    }
}

/// Guests table with the project list stored as a JSON array.
pub struct SqlGuestRepository {
    pool: SqlitePool,
}

impl SqlGuestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), AuthError> {
        sqlx::query("CREATE TABLE IF NOT EXISTS guests (email TEXT PRIMARY KEY, projects TEXT NOT NULL)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn upsert(&self, record: &GuestRecord) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO guests (email, projects) VALUES (?, ?) \
             ON CONFLICT (email) DO UPDATE SET projects = excluded.projects",
        )
        .bind(&record.email)
        .bind(serde_json::to_string(&record.projects)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GuestRepository for SqlGuestRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<GuestRecord>, AuthError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT email, projects FROM guests WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(email, projects)| {
            Ok(GuestRecord {
                email,
                projects: serde_json::from_str(&projects)?,
            })
        })
        .transpose()
    }
}

/// Issues a guest an installation token limited to their projects.
///
/// Installation tokens are short-lived and cannot be refreshed, so the stored
/// token never carries a refresh token.
pub struct GuestOAuthTokenTransferrer {
    session_reader: Arc<dyn SessionReader>,
    guests: Arc<dyn GuestRepository>,
    issuer: Arc<dyn InstallationTokenIssuer>,
    destination: Arc<dyn OAuthTokenRepository>,
}

impl GuestOAuthTokenTransferrer {
    pub fn new(
        session_reader: Arc<dyn SessionReader>,
        guests: Arc<dyn GuestRepository>,
        issuer: Arc<dyn InstallationTokenIssuer>,
        destination: Arc<dyn OAuthTokenRepository>,
    ) -> Self {
        Self {
            session_reader,
            guests,
            issuer,
            destination,
        }
    }
}

#[async_trait]
impl OAuthTokenDataSource for GuestOAuthTokenTransferrer {
    async fn get_oauth_token(&self) -> Result<OAuthToken, AuthError> {
        let session = self.session_reader.session_user().await?;
        let email = session
            .email
            .ok_or_else(|| AuthError::unauthorized("guest session has no e-mail"))?;
        let guest = self
            .guests
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AuthError::GuestNotFound {
                email: email.clone(),
            })?;

        let access_token = self.issuer.issue_installation_token(&guest.projects).await?;
        let token = OAuthToken::non_refreshable(access_token);
        persist_best_effort(self.destination.as_ref(), &session.user_id, &token).await;
        info!(user_id = %session.user_id, projects = guest.projects.len(), "issued guest installation token");
        Ok(token)
    }
}
