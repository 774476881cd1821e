//! docport: credential and session lifecycle for repository-backed API docs.
//!
//! Acquires, refreshes, and transfers OAuth access tokens for GitHub, Azure
//! DevOps (Microsoft Entra ID), and e-mail guests; shares them safely across
//! concurrent requests; and recovers API calls from expired credentials.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use docport::auth::{
//!     AccessTokenService, AccountProvider, GitHubOAuthTokenRefresher, KeyValueLockProvider,
//!     MemoryOAuthTokenRepository, RepositoryOAuthTokenDataSource, SessionUser, StaticSessionReader,
//! };
//! use docport::client::GitHubClient;
//! use docport::kv::MemoryKeyValueStore;
//!
//! # async fn example() -> docport::error::Result<()> {
//! let session = Arc::new(StaticSessionReader::new(SessionUser::new("user-1", AccountProvider::GitHub)));
//! let tokens = Arc::new(MemoryOAuthTokenRepository::new());
//! let service = AccessTokenService::new(
//!     session.clone(),
//!     tokens.clone(),
//!     Arc::new(RepositoryOAuthTokenDataSource::new(session, tokens)),
//!     Arc::new(GitHubOAuthTokenRefresher::new("client-id", None)),
//!     Arc::new(KeyValueLockProvider::new(Arc::new(MemoryKeyValueStore::new()))),
//!     "github",
//! );
//! let github = GitHubClient::new(Arc::new(service));
//! for repository in github.list_repositories().await? {
//!     println!("{}", repository.full_name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cli_session;
pub mod client;
pub mod config;
pub mod error;
pub mod kv;

#[cfg(feature = "cli")]
pub mod cli;
