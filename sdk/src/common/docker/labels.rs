//! # Docker SDK Default Labels
//!
//! File: sdk/src/common/docker/labels.rs
//!
//! Labels stamped on every container, image and network the SDK creates, so the
//! resources can be recognised (and reaped) later.
//!
use std::collections::HashMap;

pub const LABEL_BASE: &str = "com.docker.sdk";
pub const LABEL_LANG: &str = "com.docker.sdk.lang";
pub const LABEL_VERSION: &str = "com.docker.sdk.version";
pub const LABEL_CONTAINER: &str = "com.docker.sdk.container";
pub const LABEL_IMAGE: &str = "com.docker.sdk.image";
pub const LABEL_NETWORK: &str = "com.docker.sdk.network";

/// Version of this crate, stamped into `com.docker.sdk.version`.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Kind of resource being labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Container,
    Image,
    Network,
}

/// The SDK label set for a resource kind.
pub fn default_labels(kind: ResourceKind) -> HashMap<String, String> {
    let module_label = match kind {
        ResourceKind::Container => LABEL_CONTAINER,
        ResourceKind::Image => LABEL_IMAGE,
        ResourceKind::Network => LABEL_NETWORK,
    };
    HashMap::from([
        (LABEL_BASE.to_string(), "true".to_string()),
        (LABEL_LANG.to_string(), "rust".to_string()),
        (LABEL_VERSION.to_string(), SDK_VERSION.to_string()),
        (module_label.to_string(), SDK_VERSION.to_string()),
    ])
}

/// `user` merged over the defaults. SDK keys cannot be overridden.
pub fn merge_labels(kind: ResourceKind, user: &HashMap<String, String>) -> HashMap<String, String> {
    let mut labels = user.clone();
    labels.extend(default_labels(kind));
    labels
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_kind() {
        let labels = default_labels(ResourceKind::Image);
        assert_eq!(labels[LABEL_BASE], "true");
        assert_eq!(labels[LABEL_LANG], "rust");
        assert_eq!(labels[LABEL_IMAGE], SDK_VERSION);
        assert!(!labels.contains_key(LABEL_CONTAINER));
    }

    #[test]
    fn test_user_cannot_override_sdk_keys() {
        let user = HashMap::from([
            (LABEL_LANG.to_string(), "go".to_string()),
            ("team".to_string(), "infra".to_string()),
        ]);
        let labels = merge_labels(ResourceKind::Container, &user);
        assert_eq!(labels[LABEL_LANG], "rust");
        assert_eq!(labels["team"], "infra");
    }
}
