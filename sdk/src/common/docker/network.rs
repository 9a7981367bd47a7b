//! # Docker SDK Networks
//!
//! File: sdk/src/common/docker/network.rs
//!
//! ## Overview
//!
//! Thin wrappers over the daemon's network calls plus an idempotent cleanup
//! helper. Networks are created with the `bridge` driver unless told otherwise,
//! and carry the SDK labels. An empty name gets a random one.
//!
use super::api::NetworkRequest;
use super::engine::Engine;
use super::labels::{merge_labels, ResourceKind};
use crate::core::error::{is_cleanup_safe, Result, SdkError};
use anyhow::{anyhow, Context};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_DRIVER: &str = "bridge";

/// Options for `Network::create`.
#[derive(Debug, Clone, Default)]
pub struct NetworkOptions {
    pub name: String,
    pub driver: String,
    pub internal: bool,
    pub attachable: bool,
    pub enable_ipv6: bool,
    pub labels: HashMap<String, String>,
    pub options: HashMap<String, String>,
}

impl NetworkOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A network created through the SDK.
#[derive(Debug, Clone)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub driver: String,
    engine: Engine,
}

fn random_name() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("sdk-net-{}", suffix.to_lowercase())
}

impl Network {
    #[instrument(skip(engine, options), fields(network = %options.name))]
    pub async fn create(engine: &Engine, options: NetworkOptions) -> Result<Self> {
        let name = if options.name.is_empty() {
            random_name()
        } else {
            options.name
        };
        let driver = if options.driver.is_empty() {
            DEFAULT_DRIVER.to_string()
        } else {
            options.driver
        };
        let request = NetworkRequest {
            name: name.clone(),
            driver: driver.clone(),
            internal: options.internal,
            attachable: options.attachable,
            enable_ipv6: options.enable_ipv6,
            labels: merge_labels(ResourceKind::Network, &options.labels),
            options: options.options,
        };
        let id = engine
            .daemon()
            .network_create(request)
            .await
            .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
            .with_context(|| format!("Failed to create network '{}'", name))?;
        info!(network_id = %id, "Created network '{}'", name);
        Ok(Self {
            id,
            name,
            driver,
            engine: engine.clone(),
        })
    }

    /// Current daemon view of the network.
    pub async fn inspect(&self) -> Result<bollard::models::Network> {
        self.engine
            .daemon()
            .network_inspect(&self.name, false)
            .await
            .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
            .with_context(|| format!("Failed to inspect network '{}'", self.name))
    }

    #[instrument(skip(self), fields(network = %self.name))]
    pub async fn remove(&self) -> Result<()> {
        self.engine
            .daemon()
            .network_remove(&self.id)
            .await
            .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
            .with_context(|| format!("Failed to remove network '{}'", self.name))?;
        debug!("Removed network '{}'", self.name);
        Ok(())
    }
}

/// Removes `network` if there is one; already-removed networks count as success.
pub async fn cleanup_network(network: Option<&Network>) -> Result<()> {
    let Some(network) = network else {
        return Ok(());
    };
    match network.remove().await {
        Ok(()) => Ok(()),
        Err(e) if is_cleanup_safe(&e) => {
            warn!("Network '{}' was already removed", network.name);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::ClientConfig;
    use crate::testing::FakeDaemon;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_defaults_and_cleanup_is_idempotent() {
        let fake = Arc::new(FakeDaemon::new());
        let engine = Engine::new(fake.clone(), ClientConfig::default());

        let network = Network::create(&engine, NetworkOptions::default()).await.unwrap();
        assert!(network.name.starts_with("sdk-net-"));
        assert_eq!(network.driver, DEFAULT_DRIVER);
        let inspected = network.inspect().await.unwrap();
        assert_eq!(
            inspected.labels.unwrap_or_default().get("com.docker.sdk").map(String::as_str),
            Some("true")
        );

        cleanup_network(Some(&network)).await.unwrap();
        cleanup_network(Some(&network)).await.unwrap();
        cleanup_network(None).await.unwrap();
        assert!(network.remove().await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_name_fails() {
        let fake = Arc::new(FakeDaemon::new());
        let engine = Engine::new(fake, ClientConfig::default());
        Network::create(&engine, NetworkOptions::named("dup")).await.unwrap();
        assert!(Network::create(&engine, NetworkOptions::named("dup")).await.is_err());
    }
}
