//! # Docker SDK Image Reference Parser
//!
//! File: sdk/src/auth/reference.rs
//!
//! ## Overview
//!
//! Parses references of the form `[host[:port]/]path[:tag][@alg:hex]` into an
//! `ImageReference`. The registry defaults to `docker.io`, single-component Docker
//! Hub names gain the `library/` prefix, references carrying a URL scheme are
//! rejected and only `sha256` / `sha512` digests are accepted.
//!
//! A first path component is treated as a registry host when it contains a `.` or a
//! `:`, or is exactly `localhost`.
//!
//! ```rust
//! use docker_sdk::auth::reference::ImageReference;
//!
//! let r: ImageReference = "nginx:latest".parse().unwrap();
//! assert_eq!(r.registry, "docker.io");
//! assert_eq!(r.repository, "library/nginx");
//! assert_eq!(r.to_string(), "docker.io/library/nginx:latest");
//! ```
//!
use crate::core::error::{Result, SdkError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// Default registry for references without a host component.
pub const DEFAULT_REGISTRY: &str = "docker.io";

static PATH_COMPONENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w][\w.-]{0,127}$").expect("valid regex"));
static HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*(?::[0-9]+)?$|^\[[0-9a-fA-F:]+\](?::[0-9]+)?$")
        .expect("valid regex")
});

/// A parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    /// Empty when the input carried no tag.
    pub tag: String,
    /// Empty when the input carried no digest; otherwise `alg:hex`.
    pub digest: String,
}

fn invalid(reference: &str, reason: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(SdkError::InvalidImageReference {
        reference: reference.to_string(),
        reason: reason.into(),
    })
}

fn validate_digest(reference: &str, digest: &str) -> Result<()> {
    let (alg, hex_part) = digest
        .split_once(':')
        .ok_or_else(|| invalid(reference, "digest must be alg:hex"))?;
    let expected_len = match alg {
        "sha256" => 64,
        "sha512" => 128,
        other => {
            return Err(invalid(
                reference,
                format!("unsupported digest algorithm {other:?}"),
            ))
        }
    };
    if hex_part.len() != expected_len || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid(
            reference,
            format!("{alg} digest must be {expected_len} hex characters"),
        ));
    }
    Ok(())
}

/// Whether a leading path component names a registry host rather than a namespace.
pub fn is_registry_component(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

impl ImageReference {
    /// Parses `input`.
    ///
    /// # Errors
    ///
    /// `SdkError::InvalidImageReference` for empty input, URL schemes, malformed
    /// path components, tags or digests.
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Err(invalid(input, "empty reference"));
        }
        if input.contains("://") {
            return Err(invalid(input, "references must not carry a URL scheme"));
        }

        let (name_and_tag, digest) = match input.split_once('@') {
            Some((left, digest)) => {
                validate_digest(input, digest)?;
                (left, digest.to_string())
            }
            None => (input, String::new()),
        };

        // A ':' after the last '/' separates the tag; earlier ones belong to host:port.
        let last_slash = name_and_tag.rfind('/');
        let (name, tag) = match name_and_tag.rfind(':') {
            Some(idx) if last_slash.map_or(true, |s| idx > s) => {
                (&name_and_tag[..idx], name_and_tag[idx + 1..].to_string())
            }
            _ => (name_and_tag, String::new()),
        };

        if !tag.is_empty() && !TAG.is_match(&tag) {
            return Err(invalid(input, format!("invalid tag {tag:?}")));
        }
        if name.is_empty() {
            return Err(invalid(input, "missing repository"));
        }

        let (registry, remainder) = match name.split_once('/') {
            Some((first, rest)) if is_registry_component(first) => {
                if !HOST.is_match(first) {
                    return Err(invalid(input, format!("invalid registry host {first:?}")));
                }
                (first.to_string(), rest)
            }
            _ => (DEFAULT_REGISTRY.to_string(), name),
        };

        for component in remainder.split('/') {
            if !PATH_COMPONENT.is_match(component) {
                return Err(invalid(
                    input,
                    format!("invalid repository component {component:?}"),
                ));
            }
        }

        let repository = if registry == DEFAULT_REGISTRY && !remainder.contains('/') {
            format!("library/{remainder}")
        } else {
            remainder.to_string()
        };

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// The tag, or `latest` when none was given.
    pub fn tag_or_latest(&self) -> &str {
        if self.tag.is_empty() {
            "latest"
        } else {
            &self.tag
        }
    }

    /// Whether the reference points at Docker Hub.
    pub fn is_docker_hub(&self) -> bool {
        matches!(
            self.registry.as_str(),
            "docker.io" | "index.docker.io" | "registry-1.docker.io" | "registry.hub.docker.com"
        )
    }
}

impl FromStr for ImageReference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if !self.tag.is_empty() {
            write!(f, ":{}", self.tag)?;
        }
        if !self.digest.is_empty() {
            write!(f, "@{}", self.digest)?;
        }
        Ok(())
    }
}

/// Extracts the registry host from an image reference.
pub fn registry_of(image: &str) -> Result<String> {
    Ok(ImageReference::parse(image)?.registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sha256_hex() -> String {
        "a".repeat(64)
    }

    #[test]
    fn test_docker_hub_defaults() {
        let r = ImageReference::parse("nginx:latest").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "library/nginx");
        assert_eq!(r.tag, "latest");
        assert_eq!(r.digest, "");

        let r = ImageReference::parse("redis").unwrap();
        assert_eq!(r.repository, "library/redis");
        assert_eq!(r.tag, "");
        assert_eq!(r.tag_or_latest(), "latest");
    }

    #[test]
    fn test_private_registry_with_port_tag_and_digest() {
        let input = format!(
            "localhost:5000/testcontainers/ryuk:latest@sha256:{}",
            sha256_hex()
        );
        let r = ImageReference::parse(&input).unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.repository, "testcontainers/ryuk");
        assert_eq!(r.tag, "latest");
        assert_eq!(r.digest, format!("sha256:{}", sha256_hex()));
        assert_eq!(r.to_string(), input);
    }

    #[test]
    fn test_namespace_is_not_a_registry() {
        let r = ImageReference::parse("bitnami/redis:7.2").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "bitnami/redis");

        let r = ImageReference::parse("quay.io/prometheus/node-exporter").unwrap();
        assert_eq!(r.registry, "quay.io");
        assert_eq!(r.repository, "prometheus/node-exporter");

        let r = ImageReference::parse("localhost/app").unwrap();
        assert_eq!(r.registry, "localhost");
    }

    #[test]
    fn test_rejections() {
        assert!(ImageReference::parse("http://docker.io/library/nginx").is_err());
        assert!(ImageReference::parse("").is_err());
        assert!(ImageReference::parse("Nginx").is_err());
        assert!(ImageReference::parse(&format!("nginx@md5:{}", "a".repeat(32))).is_err());
        assert!(ImageReference::parse("nginx@sha256:abc").is_err());
        assert!(ImageReference::parse(&format!("nginx@sha512:{}", "b".repeat(128))).is_ok());
        let err = ImageReference::parse("https://x/y").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SdkError>(),
            Some(SdkError::InvalidImageReference { .. })
        ));
    }

    #[test]
    fn test_display_reconstructs_input_up_to_defaults() {
        for (input, expected) in [
            ("nginx", "docker.io/library/nginx"),
            ("nginx:1.25", "docker.io/library/nginx:1.25"),
            ("docker.io/library/nginx:1.25", "docker.io/library/nginx:1.25"),
            ("ghcr.io/org/app:v1", "ghcr.io/org/app:v1"),
            ("registry.example.com:443/a/b/c", "registry.example.com:443/a/b/c"),
        ] {
            assert_eq!(ImageReference::parse(input).unwrap().to_string(), expected);
        }
    }

    #[test]
    fn test_registry_of() {
        assert_eq!(registry_of("alpine").unwrap(), "docker.io");
        assert_eq!(registry_of("my.reg:5000/x").unwrap(), "my.reg:5000");
    }
}
