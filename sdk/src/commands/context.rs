//! # Docker SDK Context Commands
//!
//! File: sdk/src/commands/context.rs
//!
//! ## Overview
//!
//! `dsdk context <subcommand>` over the context store. The current context is
//! marked with `*` in `ls`.
//!
//! ## Examples
//!
//! ```bash
//! dsdk context create remote --host tcp://10.0.0.5:2376 --description "build box"
//! dsdk context use remote
//! dsdk context current
//! ```
//!
use anyhow::Context as _;
use clap::{Parser, Subcommand};
use docker_sdk::context::{self, Context, DEFAULT_CONTEXT_NAME};
use docker_sdk::core::env::DockerEnv;
use docker_sdk::core::error::Result;
use tracing::debug;

#[derive(Parser, Debug)]
pub struct ContextArgs {
    #[command(subcommand)]
    command: ContextCommand,
}

#[derive(Subcommand, Debug)]
enum ContextCommand {
    /// Lists stored contexts.
    #[command(alias = "list")]
    Ls,
    /// Prints a stored context as JSON.
    Inspect { name: String },
    /// Prints the name of the current context.
    Current,
    /// Stores a new context.
    Create {
        name: String,
        /// Daemon endpoint, e.g. `tcp://10.0.0.5:2376`.
        #[arg(long)]
        host: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        skip_tls_verify: bool,
    },
    /// Removes a stored context.
    #[command(alias = "rm")]
    Delete { name: String },
    /// Makes a context current.
    Use { name: String },
}

pub async fn handle_context(args: ContextArgs) -> Result<()> {
    let env = DockerEnv::from_process();
    match args.command {
        ContextCommand::Ls => handle_ls(&env),
        ContextCommand::Inspect { name } => handle_inspect(&env, &name),
        ContextCommand::Current => {
            println!("{}", context::current(&env)?);
            Ok(())
        }
        ContextCommand::Create {
            name,
            host,
            description,
            skip_tls_verify,
        } => {
            let ctx = Context::new(name, host)
                .with_description(description)
                .with_skip_tls_verify(skip_tls_verify);
            let stored = context::create(&env, &ctx)?;
            println!("Created context '{}'", stored.name);
            Ok(())
        }
        ContextCommand::Delete { name } => {
            context::delete(&env, &name)?;
            println!("Deleted context '{}'", name);
            Ok(())
        }
        ContextCommand::Use { name } => {
            context::use_context(&env, &name)?;
            println!("Current context is now '{}'", name);
            Ok(())
        }
    }
}

fn handle_ls(env: &DockerEnv) -> Result<()> {
    let current = context::current(env)?;
    let contexts = context::list(env)?;
    debug!("Listing {} stored context(s)", contexts.len());

    let marker = |name: &str| if name == current { "*" } else { " " };
    println!("{} {:<20} {}", marker(DEFAULT_CONTEXT_NAME), DEFAULT_CONTEXT_NAME, "current DOCKER_HOST based configuration");
    for ctx in contexts {
        let description = if ctx.metadata.description.is_empty() {
            ctx.docker_host().to_string()
        } else {
            format!("{} ({})", ctx.metadata.description, ctx.docker_host())
        };
        println!("{} {:<20} {}", marker(&ctx.name), ctx.name, description);
    }
    Ok(())
}

fn handle_inspect(env: &DockerEnv, name: &str) -> Result<()> {
    let ctx = context::inspect(env, name)?;
    let json = serde_json::to_string_pretty(&ctx).context("Failed to serialise context")?;
    println!("{}", json);
    Ok(())
}
