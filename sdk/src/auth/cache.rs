//! # Docker SDK Credential Cache
//!
//! File: sdk/src/auth/cache.rs
//!
//! ## Overview
//!
//! Memoizes resolved credentials per `ClientConfig` instance. The handle is
//! published through a `OnceCell` on the config, so concurrent first use builds
//! exactly one cache; the entry table sits behind a `parking_lot::RwLock`.
//!
//! Lookups take the read lock, misses are computed with no lock held and then
//! inserted under the write lock. Two racing misses for the same host both compute;
//! the last insert wins. Entries never expire. A `None` entry records that no
//! source had credentials for the host.
//!
use crate::auth::config::{ClientConfig, RegistryCredential};
use crate::core::error::Result;
use anyhow::Context;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Resolved credentials keyed by normalized registry host.
#[derive(Debug)]
pub struct AuthCache {
    key: String,
    entries: RwLock<HashMap<String, Option<RegistryCredential>>>,
}

impl AuthCache {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Content hash of the configuration the cache was built for.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `None` on a miss, `Some(None)` for a cached "not found".
    pub fn get(&self, host: &str) -> Option<Option<RegistryCredential>> {
        self.entries.read().get(host).cloned()
    }

    pub fn insert(&self, host: &str, credential: Option<RegistryCredential>) {
        trace!(cache_key = %self.key, host, "Caching resolved credential");
        self.entries.write().insert(host.to_string(), credential);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

/// Deterministic content hash of a configuration.
///
/// The first 16 bytes of the SHA-256 digest of the serialized document, as 32
/// lowercase hex characters.
pub fn cache_key(config: &ClientConfig) -> Result<String> {
    let serialized =
        serde_json::to_vec(config).context("Failed to serialise configuration for cache key")?;
    let digest = Sha256::digest(&serialized);
    Ok(hex::encode(&digest[..16]))
}

impl ClientConfig {
    /// The cache attached to this configuration, created on first use.
    pub fn auth_cache(&self) -> Result<Arc<AuthCache>> {
        self.cache
            .get_or_try_init(|| cache_key(self).map(|key| Arc::new(AuthCache::new(key))))
            .cloned()
    }

    /// Drops every cached credential.
    pub fn reset_auth_cache(&self) {
        if let Some(cache) = self.cache.get() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_deterministic_and_content_sensitive() {
        let a = ClientConfig::from_json(r#"{"auths":{"some.domain":{"auth":"dXNlcjpwYXNz"}}}"#).unwrap();
        let b = ClientConfig::from_json(r#"{"auths":{"some.domain":{"auth":"dXNlcjpwYXNz"}}}"#).unwrap();
        let c = ClientConfig::from_json(r#"{"auths":{"some.domain":{"auth":"b3RoZXI6cGFzcw=="}}}"#).unwrap();

        let ka = cache_key(&a).unwrap();
        assert_eq!(ka.len(), 32);
        assert!(ka.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
        assert_eq!(ka, cache_key(&b).unwrap());
        assert_ne!(ka, cache_key(&c).unwrap());
    }

    #[test]
    fn test_cache_is_created_once_per_instance() {
        let cfg = ClientConfig::default();
        let first = cfg.auth_cache().unwrap();
        let second = cfg.auth_cache().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let cloned = cfg.clone();
        assert!(!Arc::ptr_eq(&first, &cloned.auth_cache().unwrap()));
    }

    #[test]
    fn test_insert_get_and_reset() {
        let cfg = ClientConfig::default();
        let cache = cfg.auth_cache().unwrap();
        assert!(cache.is_empty());
        cache.insert(
            "reg.example",
            Some(RegistryCredential {
                username: "u".into(),
                ..RegistryCredential::default()
            }),
        );
        cache.insert("nothing.example", None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("reg.example").unwrap().unwrap().username, "u");
        assert_eq!(cache.get("nothing.example"), Some(None));
        cfg.reset_auth_cache();
        assert!(cache.get("reg.example").is_none());
    }
}
