//! # Docker SDK Command Line (`dsdk`)
//!
//! File: sdk/src/main.rs
//!
//! ## Overview
//!
//! A small front-end over the library, mostly useful to check what the SDK
//! resolves on a given machine:
//! - `context`: list, inspect and switch daemon contexts.
//! - `credentials`: show which credentials an image or registry resolves to.
//! - `image`: parse, pull and remove images.
//! - `run`: run a container through the full lifecycle.
//!
//! ## Examples
//!
//! ```bash
//! dsdk context ls
//! dsdk credentials ghcr.io/org/app:1.0
//! dsdk -v run redis:7 --port 6379 --wait-log "Ready to accept connections" --terminate
//! ```
//!
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "dsdk",
    about = "Docker engine client SDK: contexts, credentials, images and containers",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Parser, Debug)]
enum Commands {
    #[command(alias = "ctx")]
    Context(commands::context::ContextArgs),
    #[command(alias = "creds")]
    Credentials(commands::credentials::CredentialsArgs),
    #[command(alias = "i")]
    Image(commands::image::ImageArgs),
    Run(commands::run::RunArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let command_result = match cli.command {
        Commands::Context(args) => commands::context::handle_context(args).await,
        Commands::Credentials(args) => commands::credentials::handle_credentials(args).await,
        Commands::Image(args) => commands::image::handle_image(args).await,
        Commands::Run(args) => commands::run::handle_run(args).await,
    };

    if let Err(e) = command_result {
        tracing::error!("Command execution failed: {:?}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

// --- Basic Integration Tests ---
#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;

    fn dsdk_cmd() -> Command {
        Command::cargo_bin("dsdk").expect("Failed to find dsdk binary for testing")
    }

    #[test]
    fn test_main_help_flag() {
        dsdk_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("credentials"));
    }

    #[test]
    fn test_main_version_flag() {
        dsdk_cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }
}
