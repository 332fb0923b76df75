mod auth;
mod login;
mod logout;
mod push;
mod status;
mod watch;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sessionwire",
    about = "sessionwire.io CLI - sync AI coding sessions automatically",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with sessionwire via browser
    Login,

    /// Revoke the token and clear local credentials
    Logout,

    /// Watch AI tool session files and auto-upload on completion
    Watch,

    /// Upload a single session file
    Push {
        /// Path to the session file
        file: PathBuf,
    },

    /// Show authentication status, detected sources, and queue info
    Status,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sessionwire=info".parse().unwrap())
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Login => login::run_login().await,
        Commands::Logout => logout::run_logout().await,
        Commands::Watch => watch::run_watch().await,
        Commands::Push { file } => push::run_push(&file).await,
        Commands::Status => status::run_status(),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
