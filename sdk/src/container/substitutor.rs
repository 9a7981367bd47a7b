//! # Docker SDK Image Substitutors
//!
//! File: sdk/src/container/substitutor.rs
//!
//! ## Overview
//!
//! A substitutor rewrites the image reference before the image is looked up,
//! typically to route pulls through a mirror. Substitutors run in order; each
//! sees the output of the previous one.
//!
//! - `CustomHubSubstitutor`: prefixes every image with a registry, unless the
//!   image already starts with it.
//! - `PrependHubSubstitutor`: prefixes only images that resolve to Docker Hub.
//!
use crate::core::error::Result;
use std::fmt;

/// Rewrites an image reference.
pub trait ImageSubstitutor: Send + Sync + fmt::Debug {
    /// Short description for logs.
    fn description(&self) -> String;
    fn substitute(&self, image: &str) -> Result<String>;
}

/// Registry names that mean Docker Hub.
const HUB_REGISTRIES: &[&str] = &["docker.io", "index.docker.io", "registry.hub.docker.com", "registry-1.docker.io"];

/// The registry named by the first path component, if it looks like one.
fn explicit_registry(image: &str) -> Option<&str> {
    let (first, _) = image.split_once('/')?;
    (first.contains('.') || first.contains(':') || first == "localhost").then_some(first)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomHubSubstitutor {
    hub: String,
}

impl CustomHubSubstitutor {
    pub fn new(hub: impl Into<String>) -> Self {
        Self {
            hub: hub.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ImageSubstitutor for CustomHubSubstitutor {
    fn description(&self) -> String {
        format!("CustomHubSubstitutor ({})", self.hub)
    }

    fn substitute(&self, image: &str) -> Result<String> {
        if self.hub.is_empty() || image.starts_with(&self.hub) {
            return Ok(image.to_string());
        }
        Ok(format!("{}/{}", self.hub, image))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrependHubSubstitutor {
    prefix: String,
}

impl PrependHubSubstitutor {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into().trim_end_matches('/').to_string(),
        }
    }
}

impl ImageSubstitutor for PrependHubSubstitutor {
    fn description(&self) -> String {
        format!("PrependHubSubstitutor ({})", self.prefix)
    }

    fn substitute(&self, image: &str) -> Result<String> {
        if self.prefix.is_empty() {
            return Ok(image.to_string());
        }
        match explicit_registry(image) {
            None => Ok(format!("{}/{}", self.prefix, image)),
            Some(registry) if HUB_REGISTRIES.contains(&registry) => {
                let rest = &image[registry.len() + 1..];
                Ok(format!("{}/{}", self.prefix, rest))
            }
            Some(_) => Ok(image.to_string()),
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_hub() {
        let s = CustomHubSubstitutor::new("mirror.example.com/");
        assert_eq!(s.substitute("redis:7").unwrap(), "mirror.example.com/redis:7");
        assert_eq!(
            s.substitute("mirror.example.com/redis:7").unwrap(),
            "mirror.example.com/redis:7"
        );
    }

    #[test]
    fn test_prepend_hub_only_touches_hub_images() {
        let s = PrependHubSubstitutor::new("proxy.local:5000");
        assert_eq!(s.substitute("nginx").unwrap(), "proxy.local:5000/nginx");
        assert_eq!(s.substitute("bitnami/redis:7").unwrap(), "proxy.local:5000/bitnami/redis:7");
        assert_eq!(s.substitute("docker.io/library/nginx").unwrap(), "proxy.local:5000/library/nginx");
        assert_eq!(s.substitute("quay.io/coreos/etcd").unwrap(), "quay.io/coreos/etcd");
        assert_eq!(s.substitute("localhost/app").unwrap(), "localhost/app");
    }
}
