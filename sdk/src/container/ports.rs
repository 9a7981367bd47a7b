//! # Docker SDK Port Specs
//!
//! File: sdk/src/container/ports.rs
//!
//! ## Overview
//!
//! Parsing of exposed-port specs and their translation into the create-time
//! port configuration.
//!
//! Accepted spec forms: `80`, `80/udp`, `8080:80`, `127.0.0.1:8080:80/tcp`,
//! `127.0.0.1::80`. The protocol defaults to `tcp`. A spec without a host port
//! gets an ephemeral one from the daemon.
//!
use crate::core::error::Result;
use anyhow::{anyhow, bail};
use bollard::models::{HostConfig, PortBinding};
use std::collections::HashMap;

pub const DEFAULT_PROTOCOL: &str = "tcp";

/// `80` becomes `80/tcp`; a spec that already names its protocol is kept.
pub fn normalize_port(port: &str) -> String {
    let port = port.trim();
    if port.contains('/') {
        port.to_lowercase()
    } else {
        format!("{}/{}", port, DEFAULT_PROTOCOL)
    }
}

/// One parsed exposed-port spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSpec {
    /// `<port>/<proto>`.
    pub container_port: String,
    pub host_ip: String,
    pub host_port: String,
}

impl PortSpec {
    pub fn parse(spec: &str) -> Result<Self> {
        let (addr, proto) = match spec.trim().split_once('/') {
            Some((addr, proto)) if !proto.is_empty() => (addr, proto.to_lowercase()),
            Some(_) => bail!("invalid port spec {:?}: empty protocol", spec),
            None => (spec.trim(), DEFAULT_PROTOCOL.to_string()),
        };
        let parts: Vec<&str> = addr.rsplitn(3, ':').collect();
        let (container, host_port, host_ip) = match parts.as_slice() {
            [container] => (*container, "", ""),
            [container, host_port] => (*container, *host_port, ""),
            [container, host_port, host_ip] => (*container, *host_port, *host_ip),
            _ => bail!("invalid port spec {:?}", spec),
        };
        container
            .parse::<u16>()
            .map_err(|_| anyhow!("invalid port spec {:?}: bad container port", spec))?;
        if !host_port.is_empty() {
            host_port
                .parse::<u16>()
                .map_err(|_| anyhow!("invalid port spec {:?}: bad host port", spec))?;
        }
        Ok(Self {
            container_port: format!("{}/{}", container, proto),
            host_ip: host_ip.trim_matches(|c| c == '[' || c == ']').to_string(),
            host_port: host_port.to_string(),
        })
    }

    fn binding(&self) -> PortBinding {
        PortBinding {
            host_ip: Some(self.host_ip.clone()),
            host_port: Some(self.host_port.clone()),
        }
    }
}

/// Exposed port set in the shape `Config::exposed_ports` expects.
pub type ExposedSet = HashMap<String, HashMap<(), ()>>;
/// Port bindings in the shape `HostConfig::port_bindings` expects.
pub type PortMap = HashMap<String, Option<Vec<PortBinding>>>;

/// Parses every spec into the exposed set and the bindings it implies.
pub fn parse_port_specs(specs: &[String]) -> Result<(ExposedSet, PortMap)> {
    let mut exposed = ExposedSet::new();
    let mut bindings = PortMap::new();
    for spec in specs {
        let parsed = PortSpec::parse(spec)?;
        exposed.insert(parsed.container_port.clone(), HashMap::new());
        bindings
            .entry(parsed.container_port.clone())
            .or_insert_with(|| Some(Vec::new()))
            .get_or_insert_with(Vec::new)
            .push(parsed.binding());
    }
    Ok((exposed, bindings))
}

/// Keeps the pre-configured binding of every port whose number appears in
/// `exposed_specs`; other pre-configured bindings are dropped.
pub fn merge_port_bindings(configured: Option<PortMap>, mut exposed: PortMap, exposed_specs: &[String]) -> PortMap {
    let numbers: Vec<&str> = exposed_specs
        .iter()
        .map(|spec| spec.split('/').next().unwrap_or_default())
        .map(|addr| addr.rsplit(':').next().unwrap_or_default())
        .collect();
    for (port, binding) in configured.unwrap_or_default() {
        let number = port.split('/').next().unwrap_or_default();
        if numbers.contains(&number) {
            exposed.insert(port, binding);
        }
    }
    exposed
}

/// Whether the network mode shares another container's network namespace.
pub fn is_container_network_mode(host_config: &HostConfig) -> bool {
    host_config
        .network_mode
        .as_deref()
        .is_some_and(|mode| mode.starts_with("container:"))
}

/// Applies `exposed_specs` to the create-time configs.
///
/// Returns the exposed port set for `Config::exposed_ports`. Both it and the
/// port bindings are empty when the container joins another container's
/// network. Without specs every exposed image port is published.
pub fn apply_port_specs(exposed_specs: &[String], host_config: &mut HostConfig) -> Result<ExposedSet> {
    let container_mode = is_container_network_mode(host_config);
    if exposed_specs.is_empty() && !container_mode {
        host_config.publish_all_ports = Some(true);
    }
    if container_mode {
        host_config.port_bindings = None;
        return Ok(ExposedSet::new());
    }
    let (exposed, bindings) = parse_port_specs(exposed_specs)?;
    let merged = merge_port_bindings(host_config.port_bindings.take(), bindings, exposed_specs);
    host_config.port_bindings = (!merged.is_empty()).then_some(merged);
    Ok(exposed)
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn specs(s: &[&str]) -> Vec<String> {
        s.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_port("80"), "80/tcp");
        assert_eq!(normalize_port("53/UDP"), "53/udp");
    }

    #[test]
    fn test_parse_forms() {
        let p = PortSpec::parse("127.0.0.1:8080:80/udp").unwrap();
        assert_eq!(p.container_port, "80/udp");
        assert_eq!(p.host_ip, "127.0.0.1");
        assert_eq!(p.host_port, "8080");

        let p = PortSpec::parse("8080:80").unwrap();
        assert_eq!((p.host_ip.as_str(), p.host_port.as_str()), ("", "8080"));

        let p = PortSpec::parse("6379").unwrap();
        assert_eq!(p.container_port, "6379/tcp");
        assert!(p.host_port.is_empty());

        assert!(PortSpec::parse("http").is_err());
        assert!(PortSpec::parse("80/").is_err());
    }

    #[test]
    fn test_configured_binding_survives_for_exposed_port() {
        let mut host = HostConfig::default();
        let mut configured = PortMap::new();
        configured.insert(
            "80/tcp".into(),
            Some(vec![PortBinding {
                host_ip: Some("0.0.0.0".into()),
                host_port: Some("9000".into()),
            }]),
        );
        configured.insert("443/tcp".into(), Some(vec![]));
        host.port_bindings = Some(configured);

        let exposed = apply_port_specs(&specs(&["80/tcp", "5432"]), &mut host).unwrap();
        assert_eq!(exposed.len(), 2);
        let bindings = host.port_bindings.unwrap();
        assert_eq!(bindings["80/tcp"].as_ref().unwrap()[0].host_port.as_deref(), Some("9000"));
        assert!(bindings.contains_key("5432/tcp"));
        assert!(!bindings.contains_key("443/tcp"));
        assert_eq!(host.publish_all_ports, None);
    }

    #[test]
    fn test_publish_all_and_container_mode() {
        let mut host = HostConfig::default();
        assert!(apply_port_specs(&[], &mut host).unwrap().is_empty());
        assert_eq!(host.publish_all_ports, Some(true));

        let mut shared = HostConfig {
            network_mode: Some("container:db".into()),
            ..Default::default()
        };
        let exposed = apply_port_specs(&specs(&["80"]), &mut shared).unwrap();
        assert!(exposed.is_empty());
        assert!(shared.port_bindings.is_none());
        assert_eq!(shared.publish_all_ports, None);
    }
}
