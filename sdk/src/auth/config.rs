//! # Docker SDK Client Configuration Store
//!
//! File: sdk/src/auth/config.rs
//!
//! ## Overview
//!
//! Loads and saves the daemon-client configuration document (`config.json`) and
//! locates its directory.
//!
//! ## Architecture
//!
//! - **`dir`**: `${DOCKER_CONFIG}` when set and existing, else `${HOME}/.docker` when
//!   it exists, else an error.
//! - **`filepath`**: `dir()/config.json`, only when the file exists.
//! - **`load`**: Parses `${DOCKER_AUTH_CONFIG}` when set, otherwise `filepath()`.
//! - **`ClientConfig`**: The recognised keys (`auths`, `credsStore`, `credHelpers`,
//!   `proxies`, `currentContext`) plus a flattened map that carries every other key
//!   through a load/save cycle untouched.
//!
//! All maps are ordered (`BTreeMap`), so serialisation is deterministic; the
//! credential cache key in `auth::cache` relies on that.
//!
//! Each `ClientConfig` owns a lazily created credential cache and a credential
//! helper runner; neither is serialised. Cloning yields a config with a fresh,
//! empty cache.
//!
use crate::auth::cache::AuthCache;
use crate::auth::helpers::{ExecHelperRunner, HelperRunner};
use crate::core::env::DockerEnv;
use crate::core::error::{Result, SdkError};
use anyhow::{anyhow, Context};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";
/// Name of the config directory under the home directory.
pub const CONFIG_DIR_NAME: &str = ".docker";

/// Credentials for one registry, in the stored `auths` form and as resolved.
///
/// Field names follow the daemon's JSON (`auth` is the base64 `user:pass`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredential {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(rename = "auth", default, skip_serializing_if = "String::is_empty")]
    pub auth_b64: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(rename = "serveraddress", default, skip_serializing_if = "String::is_empty")]
    pub server_address: String,
    #[serde(rename = "identitytoken", default, skip_serializing_if = "String::is_empty")]
    pub identity_token: String,
    #[serde(rename = "registrytoken", default, skip_serializing_if = "String::is_empty")]
    pub registry_token: String,
}

impl RegistryCredential {
    /// True when no credential material is present (the server address alone
    /// does not count).
    pub fn is_empty(&self) -> bool {
        self.username.is_empty()
            && self.password.is_empty()
            && self.auth_b64.is_empty()
            && self.identity_token.is_empty()
            && self.registry_token.is_empty()
    }
}

/// Proxy settings for one host (or `default`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(rename = "httpProxy", default, skip_serializing_if = "String::is_empty")]
    pub http_proxy: String,
    #[serde(rename = "httpsProxy", default, skip_serializing_if = "String::is_empty")]
    pub https_proxy: String,
    #[serde(rename = "noProxy", default, skip_serializing_if = "String::is_empty")]
    pub no_proxy: String,
    #[serde(rename = "ftpProxy", default, skip_serializing_if = "String::is_empty")]
    pub ftp_proxy: String,
    #[serde(rename = "allProxy", default, skip_serializing_if = "String::is_empty")]
    pub all_proxy: String,
}

fn default_runner() -> Arc<dyn HelperRunner> {
    Arc::new(ExecHelperRunner)
}

/// The daemon-client configuration document.
#[derive(Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub auths: BTreeMap<String, RegistryCredential>,
    #[serde(rename = "credsStore", default, skip_serializing_if = "String::is_empty")]
    pub creds_store: String,
    #[serde(rename = "credHelpers", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cred_helpers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub proxies: BTreeMap<String, ProxyConfig>,
    #[serde(rename = "currentContext", default, skip_serializing_if = "String::is_empty")]
    pub current_context: String,
    /// Keys the SDK does not interpret (`psFormat`, `detachKeys`, `plugins`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    #[serde(skip)]
    pub(crate) cache: OnceCell<Arc<AuthCache>>,
    #[serde(skip, default = "default_runner")]
    pub(crate) runner: Arc<dyn HelperRunner>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auths: BTreeMap::new(),
            creds_store: String::new(),
            cred_helpers: BTreeMap::new(),
            proxies: BTreeMap::new(),
            current_context: String::new(),
            extra: Map::new(),
            cache: OnceCell::new(),
            runner: default_runner(),
        }
    }
}

impl Clone for ClientConfig {
    fn clone(&self) -> Self {
        Self {
            auths: self.auths.clone(),
            creds_store: self.creds_store.clone(),
            cred_helpers: self.cred_helpers.clone(),
            proxies: self.proxies.clone(),
            current_context: self.current_context.clone(),
            extra: self.extra.clone(),
            cache: OnceCell::new(),
            runner: self.runner.clone(),
        }
    }
}

impl PartialEq for ClientConfig {
    fn eq(&self, other: &Self) -> bool {
        self.auths == other.auths
            && self.creds_store == other.creds_store
            && self.cred_helpers == other.cred_helpers
            && self.proxies == other.proxies
            && self.current_context == other.current_context
            && self.extra == other.extra
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Stored secrets stay out of logs.
        f.debug_struct("ClientConfig")
            .field("auths", &self.auths.keys().collect::<Vec<_>>())
            .field("creds_store", &self.creds_store)
            .field("cred_helpers", &self.cred_helpers)
            .field("proxies", &self.proxies.keys().collect::<Vec<_>>())
            .field("current_context", &self.current_context)
            .field("extra_keys", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ClientConfig {
    /// Parses a configuration document from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            anyhow!(SdkError::ConfigLoad(format!(
                "failed to parse client configuration: {e}"
            )))
        })
    }

    /// Serialises the document (recognised and preserved keys, no cache state).
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialise client configuration")
    }

    /// Replaces the credential helper runner. Resets the credential cache.
    pub fn with_helper_runner(mut self, runner: Arc<dyn HelperRunner>) -> Self {
        self.runner = runner;
        self.cache = OnceCell::new();
        self
    }

    /// Proxy variables for `host`, falling back to the `default` entry.
    ///
    /// Returns `HTTP_PROXY`-style pairs for every populated field.
    pub fn proxy_env(&self, host: &str) -> BTreeMap<String, String> {
        let Some(proxy) = self.proxies.get(host).or_else(|| self.proxies.get("default")) else {
            return BTreeMap::new();
        };
        [
            ("HTTP_PROXY", &proxy.http_proxy),
            ("HTTPS_PROXY", &proxy.https_proxy),
            ("NO_PROXY", &proxy.no_proxy),
            ("FTP_PROXY", &proxy.ftp_proxy),
            ("ALL_PROXY", &proxy.all_proxy),
        ]
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .flat_map(|(key, value)| {
            [
                (key.to_string(), value.clone()),
                (key.to_lowercase(), value.clone()),
            ]
        })
        .collect()
    }

    /// Writes the document to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory '{}'", parent.display())
            })?;
        }
        let json = self.to_json()?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write configuration file '{}'", path.display()))?;
        info!("Saved client configuration to {}", path.display());
        Ok(())
    }

    /// Writes the document to `dir(env)/config.json`.
    pub fn save(&self, env: &DockerEnv) -> Result<()> {
        let path = dir(env)?.join(CONFIG_FILE_NAME);
        self.save_to(&path)
    }
}

/// Resolves the configuration directory.
///
/// # Errors
///
/// `SdkError::ConfigLoad` when neither `DOCKER_CONFIG` nor `~/.docker` exists.
pub fn dir(env: &DockerEnv) -> Result<PathBuf> {
    if let Some(dir) = &env.docker_config {
        if dir.is_dir() {
            return Ok(dir.clone());
        }
        debug!(
            "DOCKER_CONFIG '{}' does not exist, falling back to home",
            dir.display()
        );
    }
    if let Some(home) = &env.home {
        let dir = home.join(CONFIG_DIR_NAME);
        if dir.is_dir() {
            return Ok(dir);
        }
    }
    Err(anyhow!(SdkError::ConfigLoad(
        "docker config directory not found (checked DOCKER_CONFIG and ~/.docker)".into()
    )))
}

/// Path of `config.json`, when it exists.
pub fn filepath(env: &DockerEnv) -> Result<PathBuf> {
    let path = dir(env)?.join(CONFIG_FILE_NAME);
    if path.is_file() {
        Ok(path)
    } else {
        Err(anyhow!(SdkError::ConfigLoad(format!(
            "config file not found at '{}'",
            path.display()
        ))))
    }
}

/// Reads a configuration document from a file.
pub fn load_from_path(path: &Path) -> Result<ClientConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        anyhow!(SdkError::ConfigLoad(format!(
            "failed to read '{}': {e}",
            path.display()
        )))
    })?;
    ClientConfig::from_json(&content)
        .with_context(|| format!("Failed to parse configuration file '{}'", path.display()))
}

/// Loads the effective configuration.
///
/// `DOCKER_AUTH_CONFIG` wins over the file when set.
pub fn load(env: &DockerEnv) -> Result<ClientConfig> {
    if let Some(inline) = &env.docker_auth_config {
        debug!("Loading client configuration from DOCKER_AUTH_CONFIG");
        return ClientConfig::from_json(inline).context("Malformed DOCKER_AUTH_CONFIG");
    }
    let path = filepath(env)?;
    debug!("Loading client configuration from {}", path.display());
    load_from_path(&path)
}

/// Like [`load`], but a missing directory or file yields an empty configuration.
pub fn load_or_default(env: &DockerEnv) -> Result<ClientConfig> {
    if env.docker_auth_config.is_some() {
        return load(env);
    }
    match filepath(env) {
        Ok(path) => load_from_path(&path),
        Err(_) => Ok(ClientConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"{
        "auths": {
            "https://index.docker.io/v1/": { "auth": "dXNlcjpwYXNz" },
            "ghcr.io": { "identitytoken": "tok" }
        },
        "credsStore": "desktop",
        "credHelpers": { "gcr.io": "gcloud" },
        "proxies": { "default": { "httpProxy": "http://proxy:3128", "noProxy": "localhost" } },
        "currentContext": "remote",
        "psFormat": "table {{.ID}}",
        "plugins": { "buildx": { "enabled": "true" } }
    }"#;

    #[test]
    fn test_parse_recognised_fields() {
        let cfg = ClientConfig::from_json(SAMPLE).unwrap();
        assert_eq!(cfg.creds_store, "desktop");
        assert_eq!(cfg.cred_helpers.get("gcr.io").map(String::as_str), Some("gcloud"));
        assert_eq!(cfg.current_context, "remote");
        assert_eq!(cfg.auths["ghcr.io"].identity_token, "tok");
        assert_eq!(cfg.auths["https://index.docker.io/v1/"].auth_b64, "dXNlcjpwYXNz");
        assert!(cfg.extra.contains_key("psFormat"));
    }

    #[test]
    fn test_round_trip_preserves_unknown_keys() {
        let cfg = ClientConfig::from_json(SAMPLE).unwrap();
        let json = cfg.to_json().unwrap();
        let reparsed = ClientConfig::from_json(&json).unwrap();
        assert_eq!(cfg, reparsed);
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["psFormat"], "table {{.ID}}");
        assert_eq!(value["plugins"]["buildx"]["enabled"], "true");
    }

    #[test]
    fn test_dir_prefers_existing_docker_config() {
        let home = tempdir().unwrap();
        let custom = tempdir().unwrap();
        fs::create_dir(home.path().join(".docker")).unwrap();

        let env = DockerEnv::with_config_dir(custom.path()).home(home.path());
        assert_eq!(dir(&env).unwrap(), custom.path());

        let env = DockerEnv::with_config_dir(custom.path().join("missing")).home(home.path());
        assert_eq!(dir(&env).unwrap(), home.path().join(".docker"));

        let env = DockerEnv::default();
        assert!(dir(&env).is_err());
    }

    #[test]
    fn test_load_prefers_inline_auth_config() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{"credsStore":"file"}"#).unwrap();

        let env = DockerEnv::with_config_dir(dir.path());
        assert_eq!(load(&env).unwrap().creds_store, "file");

        let env = env.auth_config(r#"{"credsStore":"inline"}"#);
        assert_eq!(load(&env).unwrap().creds_store, "inline");

        let bad = DockerEnv::with_config_dir(dir.path()).auth_config("{not json");
        let err = load(&bad).unwrap_err();
        assert!(err
            .chain()
            .any(|c| matches!(c.downcast_ref::<SdkError>(), Some(SdkError::ConfigLoad(_)))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let env = DockerEnv::with_config_dir(dir.path());
        let mut cfg = ClientConfig::default();
        cfg.current_context = "ci".into();
        cfg.extra.insert("detachKeys".into(), Value::String("ctrl-e,e".into()));
        cfg.save(&env).unwrap();

        let loaded = load(&env).unwrap();
        assert_eq!(loaded, cfg);
        assert!(filepath(&env).is_ok());
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let env = DockerEnv::with_config_dir(dir.path());
        assert!(load(&env).is_err());
        assert_eq!(load_or_default(&env).unwrap(), ClientConfig::default());
    }

    #[test]
    fn test_proxy_env_falls_back_to_default() {
        let cfg = ClientConfig::from_json(SAMPLE).unwrap();
        let vars = cfg.proxy_env("unix:///var/run/docker.sock");
        assert_eq!(vars.get("HTTP_PROXY").map(String::as_str), Some("http://proxy:3128"));
        assert_eq!(vars.get("no_proxy").map(String::as_str), Some("localhost"));
        assert!(!vars.contains_key("HTTPS_PROXY"));
    }
}
