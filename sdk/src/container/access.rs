//! # Docker SDK Container Accessors
//!
//! File: sdk/src/container/access.rs
//!
//! ## Overview
//!
//! Read access to a running container: identity, reachable host and mapped
//! ports, state, logs, exec and networks. `Container` is also the target wait
//! strategies probe.
//!
use super::ports::normalize_port;
use super::Container;
use crate::common::docker::api::LogsRequest;
use crate::common::docker::engine::Engine;
use crate::common::docker::exec::{exec, ExecOptions, ExecResult};
use crate::common::docker::stdcopy;
use crate::core::error::{Result, SdkError};
use crate::wait::StrategyTarget;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use bollard::models::{ContainerInspectResponse, ContainerState, PortBinding};
use futures_util::StreamExt;
use std::collections::HashMap;

/// Host name to reach published ports of a daemon at `daemon_host`.
///
/// Local sockets map to `localhost`; TCP endpoints to their host part.
pub fn host_from_daemon_url(daemon_host: &str) -> String {
    let Some((scheme, rest)) = daemon_host.split_once("://") else {
        return "localhost".to_string();
    };
    match scheme {
        "tcp" | "http" | "https" | "ssh" => {}
        _ => return "localhost".to_string(),
    }
    let authority = rest.split('/').next().unwrap_or_default();
    let authority = authority.rsplit('@').next().unwrap_or_default();
    let host = if let Some(bracketed) = authority.strip_prefix('[') {
        bracketed.split(']').next().unwrap_or_default()
    } else {
        authority.split(':').next().unwrap_or_default()
    };
    if host.is_empty() {
        "localhost".to_string()
    } else {
        host.to_string()
    }
}

/// Picks the host port of the IPv4 binding, falling back to the first one.
fn host_port(bindings: &[PortBinding]) -> Option<u16> {
    let is_ipv4 = |b: &&PortBinding| !b.host_ip.as_deref().unwrap_or_default().contains(':');
    bindings
        .iter()
        .find(is_ipv4)
        .or_else(|| bindings.first())
        .and_then(|b| b.host_port.as_deref())
        .and_then(|p| p.parse().ok())
        .filter(|p| *p != 0)
}

impl Container {
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// First 12 characters of the id.
    pub fn short_id(&self) -> &str {
        self.inner.id.get(..12).unwrap_or(&self.inner.id)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn image(&self) -> &str {
        &self.inner.image
    }

    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    pub async fn inspect(&self) -> Result<ContainerInspectResponse> {
        self.engine()
            .daemon()
            .container_inspect(self.id())
            .await
            .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
            .with_context(|| format!("Failed to inspect container {}", self.short_id()))
    }

    pub async fn state(&self) -> Result<ContainerState> {
        Ok(self.inspect().await?.state.unwrap_or_default())
    }

    /// Host to reach the container's published ports on.
    pub async fn host(&self) -> Result<String> {
        Ok(host_from_daemon_url(&self.engine().daemon().daemon_host()))
    }

    /// Host port published for `port` (`80` or `80/tcp`).
    ///
    /// # Errors
    ///
    /// `SdkError::PortNotFound` when the port is not published (yet).
    pub async fn mapped_port(&self, port: &str) -> Result<u16> {
        let port = normalize_port(port);
        let inspect = self.inspect().await?;
        inspect
            .network_settings
            .and_then(|s| s.ports)
            .and_then(|ports| ports.get(&port).cloned().flatten())
            .and_then(|bindings| host_port(&bindings))
            .ok_or_else(|| anyhow!(SdkError::PortNotFound { port }))
    }

    /// `<proto>://host:port` of the lowest published port; without a
    /// protocol the result is `host:port`.
    pub async fn endpoint(&self, protocol: &str) -> Result<String> {
        let inspect = self.inspect().await?;
        let ports = inspect.network_settings.and_then(|s| s.ports).unwrap_or_default();
        let mut published: Vec<(u16, u16)> = ports
            .iter()
            .filter_map(|(port, bindings)| {
                let number = port.split('/').next()?.parse().ok()?;
                Some((number, host_port(bindings.as_deref()?)?))
            })
            .collect();
        published.sort_unstable();
        let (_, host_port) = published.first().copied().ok_or_else(|| {
            anyhow!(SdkError::PortNotFound {
                port: "any".to_string()
            })
        })?;
        Ok(format_endpoint(protocol, &self.host().await?, host_port))
    }

    /// `<proto>://host:port` for a specific container port.
    pub async fn port_endpoint(&self, port: &str, protocol: &str) -> Result<String> {
        let host_port = self.mapped_port(port).await?;
        Ok(format_endpoint(protocol, &self.host().await?, host_port))
    }

    /// Everything the container wrote so far, stdout and stderr interleaved.
    pub async fn logs(&self) -> Result<Vec<u8>> {
        let mut stream = self.engine().daemon().container_logs(self.id(), LogsRequest::all());
        let mut framed = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
                .with_context(|| format!("Failed to read logs of container {}", self.short_id()))?;
            framed.extend_from_slice(&chunk);
        }
        stdcopy::merge(&framed)
    }

    /// Runs `cmd` inside the container.
    pub async fn exec<S: AsRef<str>>(&self, cmd: &[S], options: &ExecOptions) -> Result<ExecResult> {
        let cmd: Vec<String> = cmd.iter().map(|s| s.as_ref().to_string()).collect();
        exec(self.engine().daemon(), self.id(), &cmd, options).await
    }

    /// Names of the networks the container is attached to, sorted.
    pub async fn networks(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.network_aliases().await?.into_keys().collect();
        names.sort();
        Ok(names)
    }

    /// Aliases per attached network.
    pub async fn network_aliases(&self) -> Result<HashMap<String, Vec<String>>> {
        let inspect = self.inspect().await?;
        Ok(inspect
            .network_settings
            .and_then(|s| s.networks)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, endpoint)| (name, endpoint.aliases.unwrap_or_default()))
            .collect())
    }

    /// IP address on the first attached network.
    pub async fn container_ip(&self) -> Result<String> {
        let inspect = self.inspect().await?;
        let mut networks: Vec<_> = inspect
            .network_settings
            .and_then(|s| s.networks)
            .unwrap_or_default()
            .into_iter()
            .collect();
        networks.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(networks
            .into_iter()
            .find_map(|(_, endpoint)| endpoint.ip_address.filter(|ip| !ip.is_empty()))
            .unwrap_or_default())
    }
}

fn format_endpoint(protocol: &str, host: &str, port: u16) -> String {
    let host = if host.contains(':') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    if protocol.is_empty() {
        format!("{}:{}", host, port)
    } else {
        format!("{}://{}:{}", protocol, host, port)
    }
}

#[async_trait]
impl StrategyTarget for Container {
    async fn host(&self) -> Result<String> {
        Container::host(self).await
    }

    async fn inspect(&self) -> Result<ContainerInspectResponse> {
        Container::inspect(self).await
    }

    async fn mapped_port(&self, port: &str) -> Result<u16> {
        Container::mapped_port(self, port).await
    }

    async fn logs(&self) -> Result<Vec<u8>> {
        Container::logs(self).await
    }

    async fn exec(&self, cmd: &[String], options: &ExecOptions) -> Result<ExecResult> {
        Container::exec(self, cmd, options).await
    }

    async fn state(&self) -> Result<ContainerState> {
        Container::state(self).await
    }

    async fn copy_from(&self, path: &str) -> Result<Vec<u8>> {
        self.copy_from_container(path).await
    }
}
