//! # Docker SDK Credentials Command
//!
//! File: sdk/src/commands/credentials.rs
//!
//! ## Overview
//!
//! `dsdk credentials <target>` prints the credential the resolver picks for an
//! image reference (default) or, with `--host`, for a registry host. Secrets are
//! redacted unless `--show-secrets` is given.
//!
use anyhow::Context as _;
use clap::Parser;
use docker_sdk::auth::{registry_credentials, registry_credentials_for_hostname, resolve_registry_host, ImageReference};
use docker_sdk::core::env::DockerEnv;
use docker_sdk::core::error::Result;
use serde_json::json;

#[derive(Parser, Debug)]
pub struct CredentialsArgs {
    /// Image reference, or a registry host with `--host`.
    target: String,
    /// Treat the target as a registry host.
    #[arg(long)]
    host: bool,
    /// Print passwords and tokens in clear.
    #[arg(long)]
    show_secrets: bool,
}

fn redact(secret: &str, show: bool) -> String {
    match (secret.is_empty(), show) {
        (true, _) => String::new(),
        (false, true) => secret.to_string(),
        (false, false) => "********".to_string(),
    }
}

pub async fn handle_credentials(args: CredentialsArgs) -> Result<()> {
    let env = DockerEnv::from_process();
    let (registry, credential) = if args.host {
        let registry = resolve_registry_host(&args.target);
        (registry, registry_credentials_for_hostname(&env, &args.target)?)
    } else {
        let reference = ImageReference::parse(&args.target)?;
        (
            resolve_registry_host(&reference.registry),
            registry_credentials(&env, &args.target)?,
        )
    };

    let output = json!({
        "registry": registry,
        "username": credential.username,
        "password": redact(&credential.password, args.show_secrets),
        "serveraddress": credential.server_address,
        "identitytoken": redact(&credential.identity_token, args.show_secrets),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to serialise credentials")?
    );
    Ok(())
}
