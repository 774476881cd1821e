//! docport CLI binary entry point.

use clap::Parser;
use docport::cli::{AuthCommands, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_env("DOCPORT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Auth(auth_args) => match auth_args.command {
            AuthCommands::Login(args) => docport::cli::auth::handle_login(&args).await,
            AuthCommands::Status => docport::cli::auth::handle_status().await,
            AuthCommands::Logout => docport::cli::auth::handle_logout().await,
        },
        Commands::Repos => docport::cli::repos::handle_repos().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
