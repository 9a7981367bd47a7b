//! # Docker SDK Port Strategies
//!
//! File: sdk/src/wait/port.rs
//!
//! ## Overview
//!
//! - `ListeningPortStrategy`: the mapped host port accepts TCP connections and a
//!   process inside the container listens on the port.
//! - `MappedPortStrategy`: the mapped host port accepts TCP connections.
//! - `ExposedPortStrategy`: any mapped TCP port accepts connections.
//!
//! The in-container check reads `/proc/net/tcp*` through `/bin/sh`. Images without
//! a usable shell (exit 126 or 127) fall back to the external check alone.
//!
use super::{ensure_alive, poll_untimed, timed, wait_for_mapping, within, Strategy, StrategyTarget, Timing};
use crate::common::docker::exec::ExecOptions;
use crate::container::ports::normalize_port;
use crate::core::error::Result;
use anyhow::anyhow;
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Exit codes meaning the shell could not be run.
const SHELL_NOT_EXECUTABLE: i64 = 126;
const SHELL_NOT_FOUND: i64 = 127;

/// Waits for `port` to be reachable from the host and listening in the container.
pub fn for_listening_port(port: &str) -> ListeningPortStrategy {
    ListeningPortStrategy {
        port: normalize_port(port),
        skip_external_check: false,
        skip_internal_check: false,
        timing: Timing::default(),
    }
}

/// Waits for `port` to be mapped and reachable from the host.
pub fn for_mapped_port(port: &str) -> MappedPortStrategy {
    MappedPortStrategy {
        port: normalize_port(port),
        timing: Timing::default(),
    }
}

/// Waits for any mapped TCP port to be reachable.
pub fn for_exposed_port() -> ExposedPortStrategy {
    ExposedPortStrategy {
        timing: Timing::default(),
    }
}

#[derive(Debug, Clone)]
pub struct ListeningPortStrategy {
    pub port: String,
    pub skip_external_check: bool,
    pub skip_internal_check: bool,
    timing: Timing,
}

timed!(ListeningPortStrategy);

impl ListeningPortStrategy {
    pub fn skip_external_check(mut self) -> Self {
        self.skip_external_check = true;
        self
    }

    pub fn skip_internal_check(mut self) -> Self {
        self.skip_internal_check = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MappedPortStrategy {
    pub port: String,
    timing: Timing,
}

timed!(MappedPortStrategy);

#[derive(Debug, Clone)]
pub struct ExposedPortStrategy {
    timing: Timing,
}

timed!(ExposedPortStrategy);

async fn can_connect(host: &str, port: u16) -> bool {
    matches!(
        tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// The shell pipeline that finds a LISTEN (`0A`) socket on `port`.
pub(crate) fn internal_check_command(port: u16) -> Vec<String> {
    vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        format!(
            "cat /proc/net/tcp* | awk '{{print $2, $4}}' | grep -i ':0*{:x} 0A'",
            port
        ),
    ]
}

fn port_number(port: &str) -> Result<u16> {
    port.split('/')
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| anyhow!("invalid port {:?}", port))
}

async fn external_check(target: &dyn StrategyTarget, host: &str, host_port: u16, interval: Duration) -> Result<()> {
    loop {
        ensure_alive(target).await?;
        if can_connect(host, host_port).await {
            return Ok(());
        }
        debug!("{}:{} not reachable yet", host, host_port);
        tokio::time::sleep(interval).await;
    }
}

#[async_trait]
impl Strategy for ListeningPortStrategy {
    #[instrument(skip(self, target), fields(port = %self.port))]
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()> {
        let container_port = port_number(&self.port)?;
        let interval = self.timing.poll_interval;
        within(self.timing.startup_timeout, async {
            let host = target.host().await?;
            let host_port = wait_for_mapping(target, &self.port, interval).await?;

            if !self.skip_external_check {
                external_check(target, &host, host_port, interval).await?;
            }
            if self.skip_internal_check {
                return Ok(());
            }

            let cmd = internal_check_command(container_port);
            loop {
                ensure_alive(target).await?;
                let result = target.exec(&cmd, &ExecOptions::default()).await?;
                match result.exit_code {
                    0 => return Ok(()),
                    SHELL_NOT_EXECUTABLE => {
                        warn!("Shell not executable in container, only external port validated");
                        return Ok(());
                    }
                    SHELL_NOT_FOUND => {
                        warn!("Shell not found in container, only external port validated");
                        return Ok(());
                    }
                    code => debug!(exit_code = code, "Port {} not listening yet", self.port),
                }
                tokio::time::sleep(interval).await;
            }
        })
        .await
    }
}

#[async_trait]
impl Strategy for MappedPortStrategy {
    #[instrument(skip(self, target), fields(port = %self.port))]
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()> {
        let interval = self.timing.poll_interval;
        within(self.timing.startup_timeout, async {
            let host = target.host().await?;
            let host_port = wait_for_mapping(target, &self.port, interval).await?;
            external_check(target, &host, host_port, interval).await
        })
        .await
    }
}

#[async_trait]
impl Strategy for ExposedPortStrategy {
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()> {
        within(self.timing.startup_timeout, async {
            let host = target.host().await?;
            poll_untimed(target, self.timing.poll_interval, || {
                let host = host.clone();
                async move {
                    let inspect = target.inspect().await?;
                    let ports = inspect
                        .network_settings
                        .and_then(|n| n.ports)
                        .unwrap_or_default();
                    for (port, bindings) in ports {
                        if !port.ends_with("/tcp") {
                            continue;
                        }
                        let mapped = bindings
                            .unwrap_or_default()
                            .into_iter()
                            .filter_map(|b| b.host_port?.parse::<u16>().ok());
                        for host_port in mapped {
                            if can_connect(&host, host_port).await {
                                return Ok(true);
                            }
                        }
                    }
                    Ok(false)
                }
            })
            .await
        })
        .await
    }
}
