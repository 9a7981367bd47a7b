//! # Docker SDK Environment Snapshot
//!
//! File: sdk/src/core/env.rs
//!
//! ## Overview
//!
//! Captures, once, the environment variables the SDK consults: config directory
//! override, inline auth config, daemon host/context selection, home directory and
//! the rootless runtime directory. Every function that resolves paths or contexts
//! takes a `&DockerEnv` instead of reading `std::env` itself, which keeps lookups
//! deterministic and lets tests describe an environment as a plain value.
//!
use std::path::PathBuf;
use tracing::debug;

/// Overrides the config directory (must exist).
pub const DOCKER_CONFIG: &str = "DOCKER_CONFIG";
/// JSON literal that replaces the config file.
pub const DOCKER_AUTH_CONFIG: &str = "DOCKER_AUTH_CONFIG";
/// Daemon endpoint; forces the current context to "default".
pub const DOCKER_HOST: &str = "DOCKER_HOST";
/// Selects the current context by name.
pub const DOCKER_CONTEXT: &str = "DOCKER_CONTEXT";
/// Rootless runtime directory.
pub const XDG_RUNTIME_DIR: &str = "XDG_RUNTIME_DIR";

/// Environment values relevant to daemon and credential discovery.
///
/// Empty variables are treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerEnv {
    pub docker_config: Option<PathBuf>,
    pub docker_auth_config: Option<String>,
    pub docker_host: Option<String>,
    pub docker_context: Option<String>,
    pub home: Option<PathBuf>,
    pub xdg_runtime_dir: Option<PathBuf>,
}

fn non_empty(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

impl DockerEnv {
    /// Reads the current process environment.
    ///
    /// Home discovery uses `HOME`, then `USERPROFILE`, then the platform default
    /// reported by the `dirs` crate.
    pub fn from_process() -> Self {
        let home = non_empty("HOME")
            .or_else(|| non_empty("USERPROFILE"))
            .map(PathBuf::from)
            .or_else(dirs::home_dir);

        let env = Self {
            docker_config: non_empty(DOCKER_CONFIG).map(PathBuf::from),
            docker_auth_config: non_empty(DOCKER_AUTH_CONFIG),
            docker_host: non_empty(DOCKER_HOST),
            docker_context: non_empty(DOCKER_CONTEXT),
            home,
            xdg_runtime_dir: non_empty(XDG_RUNTIME_DIR).map(PathBuf::from),
        };
        debug!(?env, "Captured docker environment");
        env
    }

    /// An environment rooted at `config_dir` with nothing else set.
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            docker_config: Some(config_dir.into()),
            ..Self::default()
        }
    }

    pub fn docker_host(mut self, host: impl Into<String>) -> Self {
        self.docker_host = Some(host.into());
        self
    }

    pub fn docker_context(mut self, name: impl Into<String>) -> Self {
        self.docker_context = Some(name.into());
        self
    }

    pub fn auth_config(mut self, json: impl Into<String>) -> Self {
        self.docker_auth_config = Some(json.into());
        self
    }

    pub fn home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn xdg_runtime_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.xdg_runtime_dir = Some(dir.into());
        self
    }

    /// The rootless daemon socket, when `${XDG_RUNTIME_DIR}/docker.sock` exists.
    pub fn rootless_socket(&self) -> Option<PathBuf> {
        let candidate = self.xdg_runtime_dir.as_ref()?.join("docker.sock");
        candidate.exists().then_some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builder_methods() {
        let env = DockerEnv::with_config_dir("/cfg")
            .docker_host("tcp://1.2.3.4:2375")
            .docker_context("remote");
        assert_eq!(env.docker_config, Some(PathBuf::from("/cfg")));
        assert_eq!(env.docker_host.as_deref(), Some("tcp://1.2.3.4:2375"));
        assert_eq!(env.docker_context.as_deref(), Some("remote"));
        assert!(env.docker_auth_config.is_none());
    }

    #[test]
    fn test_rootless_socket_requires_existing_file() {
        let dir = tempdir().unwrap();
        let env = DockerEnv::default().xdg_runtime_dir(dir.path());
        assert!(env.rootless_socket().is_none());

        std::fs::write(dir.path().join("docker.sock"), b"").unwrap();
        assert_eq!(env.rootless_socket(), Some(dir.path().join("docker.sock")));
    }
}
