//! # Docker SDK Image Commands
//!
//! File: sdk/src/commands/image.rs
//!
//! ## Overview
//!
//! - `dsdk image parse <ref>`: prints the registry, repository, tag and digest.
//! - `dsdk image pull <ref> [--platform os/arch]`: pulls with resolved credentials.
//! - `dsdk image remove <ref> [--force]`: removes a local image.
//!
//! Pull and remove talk to the daemon of the current context.
//!
use clap::{Parser, Subcommand};
use docker_sdk::auth::ImageReference;
use docker_sdk::common::docker::images::{pull_image, remove_image, PullOptions};
use docker_sdk::common::docker::Engine;
use docker_sdk::core::env::DockerEnv;
use docker_sdk::core::error::Result;

#[derive(Parser, Debug)]
pub struct ImageArgs {
    #[command(subcommand)]
    command: ImageCommand,
}

#[derive(Subcommand, Debug)]
enum ImageCommand {
    /// Parses an image reference.
    Parse { reference: String },
    /// Pulls an image.
    Pull {
        reference: String,
        /// `os/arch[/variant]`.
        #[arg(long, default_value = "")]
        platform: String,
    },
    /// Removes a local image.
    #[command(alias = "rm")]
    Remove {
        reference: String,
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn handle_image(args: ImageArgs) -> Result<()> {
    match args.command {
        ImageCommand::Parse { reference } => {
            let parsed = ImageReference::parse(&reference)?;
            println!("registry:   {}", parsed.registry);
            println!("repository: {}", parsed.repository);
            println!("tag:        {}", parsed.tag);
            println!("digest:     {}", parsed.digest);
            Ok(())
        }
        ImageCommand::Pull { reference, platform } => {
            let engine = Engine::connect(&DockerEnv::from_process())?;
            let options = PullOptions {
                platform,
                ..Default::default()
            };
            let result = pull_image(&engine, &reference, &options).await;
            engine.close_if_owned().await;
            result?;
            println!("Pulled {}", reference);
            Ok(())
        }
        ImageCommand::Remove { reference, force } => {
            let engine = Engine::connect(&DockerEnv::from_process())?;
            let result = remove_image(&engine, &reference, force).await;
            engine.close_if_owned().await;
            for item in result? {
                if let Some(untagged) = item.untagged {
                    println!("Untagged: {}", untagged);
                }
                if let Some(deleted) = item.deleted {
                    println!("Deleted: {}", deleted);
                }
            }
            Ok(())
        }
    }
}
