//! CLI entry point for docport.

pub mod auth;
pub mod repos;

use clap::{Parser, Subcommand};

/// docport CLI
#[derive(Parser, Debug)]
#[command(name = "docport", version, about = "docport: API docs from your repositories")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authentication management
    Auth(AuthArgs),
    /// List repositories visible to the signed-in user
    Repos,
}

/// Arguments for the `auth` subcommand group.
#[derive(Parser, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommands,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Sign in with the GitHub device flow
    Login(LoginArgs),
    /// Show the current CLI session
    Status,
    /// Sign out and forget the current CLI session
    Logout,
}

/// Arguments for `docport auth login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// OAuth scopes to request, space separated
    #[arg(long)]
    pub scope: Option<String>,
}
