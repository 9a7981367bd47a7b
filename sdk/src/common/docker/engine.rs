//! # Docker SDK Engine Handle
//!
//! File: sdk/src/common/docker/engine.rs
//!
//! ## Overview
//!
//! `Engine` bundles the two shared collaborators every daemon-facing operation
//! needs: the daemon client and the credential configuration. It is cheap to clone
//! and is what containers, networks and hooks hold on to.
//!
//! Ownership of the daemon client decides who closes it: `Engine::connect` opens
//! (and therefore owns) its client, `Engine::new` wraps an injected one that the SDK
//! never closes.
//!
use super::api::DaemonClient;
use super::connect::BollardClient;
use crate::auth::config::{self, ClientConfig};
use crate::core::env::DockerEnv;
use crate::core::error::Result;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct Engine {
    daemon: Arc<dyn DaemonClient>,
    credentials: Arc<ClientConfig>,
    owns_daemon: bool,
}

impl Engine {
    /// Connects to the daemon of the current context and loads the client config.
    pub fn connect(env: &DockerEnv) -> Result<Self> {
        let credentials = config::load_or_default(env)?;
        let daemon = BollardClient::connect(env)?;
        Ok(Self {
            daemon: Arc::new(daemon),
            credentials: Arc::new(credentials),
            owns_daemon: true,
        })
    }

    /// Wraps an injected daemon client. The SDK never closes it.
    pub fn new(daemon: Arc<dyn DaemonClient>, credentials: ClientConfig) -> Self {
        Self {
            daemon,
            credentials: Arc::new(credentials),
            owns_daemon: false,
        }
    }

    /// Wraps a daemon client whose lifetime the engine takes over.
    pub fn owning(daemon: Arc<dyn DaemonClient>, credentials: ClientConfig) -> Self {
        Self {
            owns_daemon: true,
            ..Self::new(daemon, credentials)
        }
    }

    pub fn daemon(&self) -> &dyn DaemonClient {
        self.daemon.as_ref()
    }

    pub fn daemon_arc(&self) -> Arc<dyn DaemonClient> {
        Arc::clone(&self.daemon)
    }

    pub fn credentials(&self) -> &ClientConfig {
        &self.credentials
    }

    pub fn credentials_arc(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.credentials)
    }

    pub fn owns_daemon(&self) -> bool {
        self.owns_daemon
    }

    /// Closes the daemon client when this engine owns it.
    pub async fn close_if_owned(&self) {
        if self.owns_daemon {
            debug!(host = %self.daemon.daemon_host(), "Closing owned daemon client");
            self.daemon.close().await;
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("daemon_host", &self.daemon.daemon_host())
            .field("owns_daemon", &self.owns_daemon)
            .finish()
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDaemon;

    #[tokio::test]
    async fn test_injected_client_is_never_closed() {
        let fake = Arc::new(FakeDaemon::new());
        let engine = Engine::new(fake.clone(), ClientConfig::default());
        engine.close_if_owned().await;
        assert_eq!(fake.close_count(), 0);

        let engine = Engine::owning(fake.clone(), ClientConfig::default());
        engine.clone().close_if_owned().await;
        assert_eq!(fake.close_count(), 1);
    }
}
