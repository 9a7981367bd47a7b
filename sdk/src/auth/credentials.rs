//! # Docker SDK Registry Credential Resolver
//!
//! File: sdk/src/auth/credentials.rs
//!
//! ## Overview
//!
//! Resolves the credential for a registry host from the effective `ClientConfig`.
//! Hosts are normalized first (every Docker Hub alias maps to
//! `https://index.docker.io/v1/`), then the sources are tried in order:
//!
//! 1. `credHelpers[host]`: the named helper's answer is final, even when empty.
//! 2. `credsStore`: used when the helper returns a username or password.
//! 3. `auths[host]`: the stored entry (identity token, explicit user/password, or
//!    base64 `auth`).
//! 4. The platform default helper (`pass`/`secretservice`, `osxkeychain`, `wincred`).
//!
//! Results, including "nothing found", are memoized in the config's `AuthCache`.
//! When no source yields anything the lookup fails with
//! `SdkError::CredentialsNotFound`.
//!
//! ## Examples
//!
//! ```rust
//! use docker_sdk::auth::config::ClientConfig;
//!
//! let cfg = ClientConfig::from_json(r#"{"auths":{"some.domain":{"auth":"dXNlcjpwYXNz"}}}"#).unwrap();
//! let cred = cfg.auth_for_hostname("some.domain").unwrap();
//! assert_eq!(cred.username, "user");
//! assert_eq!(cred.password, "pass");
//! ```
//!
use crate::auth::config::{self, ClientConfig, RegistryCredential};
use crate::auth::helpers::{self, HelperRunner};
use crate::auth::reference::registry_of;
use crate::core::env::DockerEnv;
use crate::core::error::{MultiError, Result, SdkError};
use anyhow::anyhow;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Canonical key of Docker Hub in `auths`.
pub const DOCKER_HUB_AUTH_KEY: &str = "https://index.docker.io/v1/";

const DOCKER_HUB_ALIASES: &[&str] = &[
    "index.docker.io",
    "docker.io",
    "https://index.docker.io/v1/",
    "registry-1.docker.io",
    "index.docker.io/v1",
    "index.docker.io/v1/",
];

/// Maps every Docker Hub alias to [`DOCKER_HUB_AUTH_KEY`]; other hosts pass through.
pub fn resolve_registry_host(host: &str) -> String {
    if DOCKER_HUB_ALIASES.contains(&host) {
        DOCKER_HUB_AUTH_KEY.to_string()
    } else {
        host.to_string()
    }
}

/// Name of the platform's default credential helper, if any.
pub fn default_helper(runner: &dyn HelperRunner) -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("osxkeychain")
    } else if cfg!(windows) {
        Some("wincred")
    } else if cfg!(unix) {
        if runner.has_program("pass") {
            Some("pass")
        } else {
            Some("secretservice")
        }
    } else {
        None
    }
}

/// Turns a stored `auths` entry into the effective credential.
///
/// # Errors
///
/// `SdkError::InvalidStoredAuth` when `auth` is not base64 or lacks the `:`
/// separator.
pub fn decode_stored(host: &str, stored: &RegistryCredential) -> Result<RegistryCredential> {
    let mut resolved = stored.clone();
    if resolved.server_address.is_empty() {
        resolved.server_address = host.to_string();
    }

    if !stored.identity_token.is_empty() {
        resolved.username = String::new();
        resolved.password = stored.identity_token.clone();
        return Ok(resolved);
    }

    if !stored.username.is_empty() || !stored.password.is_empty() || stored.auth_b64.is_empty() {
        return Ok(resolved);
    }

    let invalid = |reason: String| {
        anyhow!(SdkError::InvalidStoredAuth {
            host: host.to_string(),
            reason,
        })
    };
    let decoded = STANDARD
        .decode(stored.auth_b64.trim())
        .map_err(|e| invalid(format!("base64 decode failed: {e}")))?;
    let decoded = String::from_utf8(decoded).map_err(|e| invalid(e.to_string()))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| invalid("decoded auth has no ':' separator".into()))?;
    resolved.username = username.to_string();
    resolved.password = password.to_string();
    Ok(resolved)
}

/// Encodes a credential as the URL-safe base64 JSON expected in `X-Registry-Auth`.
pub fn encode_registry_auth(credential: &RegistryCredential) -> Result<String> {
    let json = serde_json::to_vec(credential)?;
    Ok(URL_SAFE.encode(json))
}

impl ClientConfig {
    /// Credentials for `host`, normalized and memoized.
    ///
    /// # Errors
    ///
    /// `SdkError::CredentialsNotFound` when no source has credentials; helper and
    /// stored-entry failures otherwise.
    #[instrument(skip(self))]
    pub fn auth_for_hostname(&self, host: &str) -> Result<RegistryCredential> {
        let host = resolve_registry_host(host);
        let cache = self.auth_cache()?;

        let resolved = match cache.get(&host) {
            Some(hit) => {
                debug!(cache_key = %cache.key(), "Credential cache hit");
                hit
            }
            None => {
                let computed = self.resolve_uncached(&host)?;
                cache.insert(&host, computed.clone());
                computed
            }
        };

        resolved.ok_or_else(|| anyhow!(SdkError::CredentialsNotFound))
    }

    /// Credentials for the registry an image reference points at.
    pub fn auth_for_image(&self, image: &str) -> Result<RegistryCredential> {
        let registry = registry_of(image)?;
        self.auth_for_hostname(&registry)
    }

    /// Credentials for every distinct registry among `images`, keyed by registry.
    ///
    /// Registries without credentials are omitted; every other failure is collected
    /// and returned as one joined error.
    pub fn auth_configs_for_images<S: AsRef<str>>(
        &self,
        images: &[S],
    ) -> Result<BTreeMap<String, RegistryCredential>> {
        let mut found = BTreeMap::new();
        let mut errors = MultiError::new();

        for image in images {
            let image = image.as_ref();
            let registry = match registry_of(image) {
                Ok(registry) => registry,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            if found.contains_key(&registry) {
                continue;
            }
            match self.auth_for_hostname(&registry) {
                Ok(cred) => {
                    found.insert(registry, cred);
                }
                Err(e) if is_credentials_not_found(&e) => {
                    debug!(registry = %registry, "No credentials, skipping");
                }
                Err(e) => errors.push(e.context(format!("resolving credentials for {image}"))),
            }
        }

        errors.into_result()?;
        Ok(found)
    }

    fn resolve_uncached(&self, host: &str) -> Result<Option<RegistryCredential>> {
        let runner = self.runner.as_ref();

        if let Some(name) = self.cred_helpers.get(host) {
            debug!(helper = %name, "Using per-host credential helper");
            let cred = helpers::get_credential(runner, name, host)?;
            return Ok((!cred.is_empty()).then_some(cred));
        }

        if !self.creds_store.is_empty() {
            let cred = helpers::get_credential(runner, &self.creds_store, host)?;
            if !cred.username.is_empty() || !cred.password.is_empty() {
                debug!(helper = %self.creds_store, "Using credential store");
                return Ok(Some(cred));
            }
        }

        if let Some(stored) = self.auths.get(host) {
            debug!("Using stored auths entry");
            return decode_stored(host, stored).map(Some);
        }

        if let Some(name) = default_helper(runner) {
            let cred = helpers::get_credential(runner, name, host)?;
            if !cred.is_empty() {
                debug!(helper = %name, "Using platform default credential helper");
                return Ok(Some(cred));
            }
        }

        Ok(None)
    }
}

/// Whether the error is the recoverable "no credentials" sentinel.
pub fn is_credentials_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<SdkError>(),
        Some(SdkError::CredentialsNotFound)
    )
}

/// Loads the effective configuration and resolves credentials for an image.
pub fn registry_credentials(env: &DockerEnv, image: &str) -> Result<RegistryCredential> {
    config::load_or_default(env)?.auth_for_image(image)
}

/// Loads the effective configuration and resolves credentials for a host.
pub fn registry_credentials_for_hostname(env: &DockerEnv, host: &str) -> Result<RegistryCredential> {
    config::load_or_default(env)?.auth_for_hostname(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHelperRunner;
    use std::sync::Arc;

    fn config(json: &str, runner: MockHelperRunner) -> ClientConfig {
        ClientConfig::from_json(json)
            .unwrap()
            .with_helper_runner(Arc::new(runner))
    }

    fn b64(s: &str) -> String {
        STANDARD.encode(s)
    }

    #[test]
    fn test_resolve_registry_host_is_idempotent() {
        for h in DOCKER_HUB_ALIASES {
            assert_eq!(resolve_registry_host(h), DOCKER_HUB_AUTH_KEY);
        }
        for h in ["ghcr.io", "localhost:5000", "docker.io", "index.docker.io/v1", "x"] {
            let once = resolve_registry_host(h);
            assert_eq!(resolve_registry_host(&once), once);
        }
        assert_eq!(resolve_registry_host("quay.io"), "quay.io");
    }

    #[test]
    fn test_base64_stored_entry() {
        let json = format!(r#"{{"auths":{{"some.domain":{{"auth":"{}"}}}}}}"#, b64("user:pass"));
        let cfg = config(&json, MockHelperRunner::new());
        let cred = cfg.auth_for_hostname("some.domain").unwrap();
        assert_eq!(cred.username, "user");
        assert_eq!(cred.password, "pass");

        let key_before = cfg.auth_cache().unwrap().key().to_string();
        let mut changed = cfg.clone();
        changed.auths.get_mut("some.domain").unwrap().auth_b64 = b64("other:pass");
        assert_ne!(changed.auth_cache().unwrap().key(), key_before);
    }

    #[test]
    fn test_stored_entry_edge_cases() {
        let no_colon = RegistryCredential {
            auth_b64: b64("userpass"),
            ..RegistryCredential::default()
        };
        let err = decode_stored("h", &no_colon).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SdkError>(),
            Some(SdkError::InvalidStoredAuth { .. })
        ));

        let empty = decode_stored("h", &RegistryCredential::default()).unwrap();
        assert_eq!(empty.username, "");
        assert_eq!(empty.password, "");

        let colon_in_password = RegistryCredential {
            auth_b64: b64("u:p:w"),
            ..RegistryCredential::default()
        };
        let cred = decode_stored("h", &colon_in_password).unwrap();
        assert_eq!((cred.username.as_str(), cred.password.as_str()), ("u", "p:w"));

        let token = RegistryCredential {
            auth_b64: b64("user:pass"),
            identity_token: "tok".into(),
            ..RegistryCredential::default()
        };
        let cred = decode_stored("h", &token).unwrap();
        assert_eq!(cred.username, "");
        assert_eq!(cred.password, "tok");
        assert_eq!(cred.auth_b64, b64("user:pass"));
    }

    #[test]
    fn test_cred_helper_answer_is_final() {
        let runner = MockHelperRunner::new().respond(
            "docker-credential-gcloud",
            1,
            "credentials not found in native keychain",
            "",
        );
        let json = format!(
            r#"{{"credHelpers":{{"gcr.io":"gcloud"}},"auths":{{"gcr.io":{{"auth":"{}"}}}}}}"#,
            b64("user:pass")
        );
        let cfg = config(&json, runner);
        let err = cfg.auth_for_hostname("gcr.io").unwrap_err();
        assert!(is_credentials_not_found(&err));
    }

    #[test]
    fn test_creds_store_falls_through_when_empty() {
        let runner = MockHelperRunner::new().respond(
            "docker-credential-desktop",
            1,
            "credentials not found in native keychain",
            "",
        );
        let json = format!(
            r#"{{"credsStore":"desktop","auths":{{"reg.example":{{"auth":"{}"}}}}}}"#,
            b64("stored:secret")
        );
        let cfg = config(&json, runner);
        let cred = cfg.auth_for_hostname("reg.example").unwrap();
        assert_eq!(cred.username, "stored");
    }

    #[test]
    fn test_creds_store_wins_over_auths() {
        let runner = MockHelperRunner::new().respond(
            "docker-credential-desktop",
            0,
            r#"{"Username":"<token>","Secret":"xyz"}"#,
            "",
        );
        let json = format!(
            r#"{{"credsStore":"desktop","auths":{{"reg.example":{{"auth":"{}"}}}}}}"#,
            b64("stored:secret")
        );
        let cfg = config(&json, runner);
        let cred = cfg.auth_for_hostname("reg.example").unwrap();
        assert_eq!(cred.username, "");
        assert_eq!(cred.password, "xyz");
    }

    #[test]
    fn test_docker_hub_aliases_share_the_stored_entry() {
        let json = format!(
            r#"{{"auths":{{"https://index.docker.io/v1/":{{"auth":"{}"}}}}}}"#,
            b64("hub:pw")
        );
        let cfg = config(&json, MockHelperRunner::new());
        assert_eq!(cfg.auth_for_hostname("docker.io").unwrap().username, "hub");
        assert_eq!(cfg.auth_for_image("nginx:latest").unwrap().username, "hub");
    }

    #[test]
    fn test_helper_errors_propagate() {
        let runner = MockHelperRunner::new().respond("docker-credential-broken", 3, "oops", "bad");
        let cfg = config(r#"{"credHelpers":{"reg.example":"broken"}}"#, runner);
        let err = cfg.auth_for_hostname("reg.example").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SdkError>(),
            Some(SdkError::HelperExec { .. })
        ));
    }

    #[test]
    fn test_results_are_cached_per_instance() {
        let runner = Arc::new(MockHelperRunner::new().respond(
            "docker-credential-desktop",
            0,
            r#"{"Username":"alice","Secret":"pw"}"#,
            "",
        ));
        let cfg = ClientConfig::from_json(r#"{"credsStore":"desktop"}"#)
            .unwrap()
            .with_helper_runner(runner.clone());

        for _ in 0..5 {
            assert_eq!(cfg.auth_for_hostname("reg.example").unwrap().username, "alice");
        }
        assert_eq!(runner.calls("docker-credential-desktop"), 1);

        cfg.reset_auth_cache();
        cfg.auth_for_hostname("reg.example").unwrap();
        assert_eq!(runner.calls("docker-credential-desktop"), 2);
    }

    #[test]
    fn test_concurrent_first_use_runs_helper_at_most_twice() {
        let runner = Arc::new(MockHelperRunner::new().respond(
            "docker-credential-desktop",
            0,
            r#"{"Username":"alice","Secret":"pw"}"#,
            "",
        ));
        let cfg = Arc::new(
            ClientConfig::from_json(r#"{"credsStore":"desktop"}"#)
                .unwrap()
                .with_helper_runner(runner.clone()),
        );

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let cfg = cfg.clone();
                std::thread::spawn(move || cfg.auth_for_hostname("reg.example").unwrap())
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results[0], results[1]);
        assert!(runner.calls("docker-credential-desktop") <= 2);
    }

    #[test]
    fn test_batch_lookup_skips_missing_and_joins_errors() {
        let runner = MockHelperRunner::new()
            .respond("docker-credential-bad", 1, "no credentials server URL", "");
        let json = format!(
            r#"{{"credHelpers":{{"bad.example":"bad"}},"auths":{{"good.example":{{"auth":"{}"}}}}}}"#,
            b64("g:p")
        );
        let cfg = config(&json, runner);

        let found = cfg
            .auth_configs_for_images(&["good.example/app:1", "nothing.example/app"])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["good.example"].username, "g");

        let err = cfg
            .auth_configs_for_images(&["good.example/app", "bad.example/x", "http://nope"])
            .unwrap_err();
        let multi = err.downcast_ref::<MultiError>().unwrap();
        assert_eq!(multi.len(), 2);
    }

    #[test]
    fn test_encode_registry_auth_is_url_safe_json() {
        let cred = RegistryCredential {
            username: "u".into(),
            password: "p?>".into(),
            server_address: "reg.example".into(),
            ..RegistryCredential::default()
        };
        let encoded = encode_registry_auth(&cred).unwrap();
        assert!(!encoded.contains('+') && !encoded.contains('/'));
        let decoded: RegistryCredential =
            serde_json::from_slice(&URL_SAFE.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, cred);
    }
}
