//! # Docker SDK Run Command
//!
//! File: sdk/src/commands/run.rs
//!
//! ## Overview
//!
//! `dsdk run <image>` builds a container definition from flags and runs it
//! through the lifecycle orchestrator: pull if needed, create, start, wait.
//! The container id and published endpoints are printed once it is ready.
//! With `--terminate` the container is removed again straight away, which is
//! handy to check a readiness strategy against a real image.
//!
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use docker_sdk::container::{self, Definition, TerminateOptions};
use docker_sdk::core::error::Result;
use docker_sdk::wait::{for_all, for_listening_port, for_log, WaitStrategy};
use tracing::info;

#[derive(Parser, Debug)]
pub struct RunArgs {
    image: String,
    #[arg(long)]
    name: Option<String>,
    /// Port to expose, e.g. `6379` or `53/udp`. Repeatable.
    #[arg(short, long = "port")]
    ports: Vec<String>,
    /// `KEY=VALUE` environment entry. Repeatable.
    #[arg(short, long = "env")]
    envs: Vec<String>,
    /// Wait until this text appears in the logs.
    #[arg(long)]
    wait_log: Option<String>,
    /// Wait until this port is listening. Repeatable.
    #[arg(long)]
    wait_port: Vec<String>,
    /// Readiness timeout in seconds.
    #[arg(long, default_value_t = 60)]
    timeout: u64,
    /// Always pull the image before creating.
    #[arg(long)]
    pull: bool,
    /// Terminate the container once it is ready.
    #[arg(long)]
    terminate: bool,
    /// Command passed to the container.
    #[arg(last = true)]
    cmd: Vec<String>,
}

fn parse_env(entry: &str) -> Result<(String, String)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => bail!("Invalid environment entry '{}', expected KEY=VALUE", entry),
    }
}

fn wait_strategy(args: &RunArgs) -> Option<WaitStrategy> {
    let timeout = Duration::from_secs(args.timeout);
    let mut strategies: Vec<WaitStrategy> = args
        .wait_port
        .iter()
        .map(|port| for_listening_port(port).with_startup_timeout(timeout).into())
        .collect();
    if let Some(needle) = &args.wait_log {
        strategies.push(for_log(needle).with_startup_timeout(timeout).into());
    }
    match strategies.len() {
        0 => None,
        1 => strategies.pop(),
        _ => Some(for_all(strategies).with_deadline(timeout).into()),
    }
}

pub async fn handle_run(args: RunArgs) -> Result<()> {
    let mut definition = Definition::new(&args.image)
        .with_exposed_ports(args.ports.iter().cloned())
        .with_always_pull(args.pull);
    if let Some(name) = &args.name {
        definition = definition.with_name(name);
    }
    if !args.cmd.is_empty() {
        definition = definition.with_cmd(args.cmd.clone());
    }
    for entry in &args.envs {
        let (key, value) = parse_env(entry)?;
        definition = definition.with_env(&key, &value);
    }
    if let Some(strategy) = wait_strategy(&args) {
        definition = definition.with_wait_strategy(strategy);
    }

    let started = container::run(definition).await;
    let running = match started {
        Ok(c) => c,
        Err(err) => {
            if let Some(c) = &err.container {
                let _ = c.terminate(TerminateOptions::default()).await;
            }
            return Err(err.source);
        }
    };

    println!("{}", running.id());
    for port in &args.ports {
        match running.port_endpoint(port, "").await {
            Ok(endpoint) => println!("{} -> {}", port, endpoint),
            Err(e) => info!("No published endpoint for {}: {:#}", port, e),
        }
    }

    if args.terminate {
        running.terminate(TerminateOptions::default()).await?;
        info!("Terminated container {}", running.short_id());
    }
    Ok(())
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["run", "redis:7"];
        argv.extend_from_slice(extra);
        RunArgs::parse_from(argv)
    }

    #[test]
    fn test_parse_env_entries() {
        assert_eq!(parse_env("A=1").unwrap(), ("A".to_string(), "1".to_string()));
        assert_eq!(parse_env("B=x=y").unwrap(), ("B".to_string(), "x=y".to_string()));
        assert!(parse_env("=1").is_err());
        assert!(parse_env("NOEQ").is_err());
    }

    #[test]
    fn test_wait_strategy_selection() {
        assert!(wait_strategy(&args(&[])).is_none());
        let single = wait_strategy(&args(&["--wait-log", "Ready"])).unwrap();
        assert_eq!(single.kind(), "log");
        let combined = wait_strategy(&args(&["--wait-log", "Ready", "--wait-port", "6379"])).unwrap();
        assert_eq!(combined.kind(), "all");
    }

    #[test]
    fn test_trailing_command() {
        let parsed = args(&["--", "redis-server", "--appendonly", "yes"]);
        assert_eq!(parsed.cmd, vec!["redis-server", "--appendonly", "yes"]);
    }
}
