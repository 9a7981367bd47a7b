//! # Docker SDK Context Store
//!
//! File: sdk/src/context/mod.rs
//!
//! ## Overview
//!
//! A context is a named daemon endpoint stored under
//! `<config-dir>/contexts/meta/<sha256-hex-of-name>/meta.json`. This module reads
//! and writes those documents and resolves which endpoint the SDK should talk to.
//!
//! ## Architecture
//!
//! - **`Context`**: The `meta.json` document. `Metadata` keeps every key other than
//!   `Description` in a flattened map, so arbitrary fields survive a round-trip at
//!   their original level.
//! - **`store`**: `list`, `inspect`, `create`, `delete`, `use_context`, plus the
//!   `current` / `current_docker_host` resolution rules.
//!
pub mod store;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub use store::{
    create, current, current_docker_host, delete, inspect, list, meta_root, use_context,
    DEFAULT_CONTEXT_NAME,
};

/// Endpoint key the SDK dispatches to.
pub const DOCKER_ENDPOINT: &str = "docker";

/// Free-form context metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "Description", default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Siblings of `Description`, kept verbatim.
    #[serde(flatten)]
    pub additional_fields: Map<String, Value>,
}

/// One daemon endpoint of a context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "Host", default)]
    pub host: String,
    #[serde(rename = "SkipTLSVerify", default)]
    pub skip_tls_verify: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A stored context document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(rename = "Name")]
    pub name: String,
    /// Hex SHA-256 of `name`; the directory the document lives in.
    #[serde(skip)]
    pub encoded_name: String,
    #[serde(rename = "Metadata", default)]
    pub metadata: Metadata,
    #[serde(rename = "Endpoints", default)]
    pub endpoints: BTreeMap<String, Endpoint>,
}

/// Hex SHA-256 digest of a context name.
pub fn encode_name(name: &str) -> String {
    hex::encode(Sha256::digest(name.as_bytes()))
}

impl Context {
    /// A context pointing its docker endpoint at `host`.
    pub fn new(name: impl Into<String>, host: impl Into<String>) -> Self {
        let name = name.into();
        let mut endpoints = BTreeMap::new();
        endpoints.insert(
            DOCKER_ENDPOINT.to_string(),
            Endpoint {
                host: host.into(),
                ..Endpoint::default()
            },
        );
        Self {
            encoded_name: encode_name(&name),
            name,
            metadata: Metadata::default(),
            endpoints,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.description = description.into();
        self
    }

    /// Adds a metadata field stored next to `Description`.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.additional_fields.insert(key.into(), value.into());
        self
    }

    pub fn with_skip_tls_verify(mut self, skip: bool) -> Self {
        self.endpoints
            .entry(DOCKER_ENDPOINT.to_string())
            .or_default()
            .skip_tls_verify = skip;
        self
    }

    /// The docker endpoint, if one is configured.
    pub fn docker_endpoint(&self) -> Option<&Endpoint> {
        self.endpoints.get(DOCKER_ENDPOINT)
    }

    /// Host of the docker endpoint, empty when unset.
    pub fn docker_host(&self) -> &str {
        self.docker_endpoint().map_or("", |e| e.host.as_str())
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_name_is_sha256_hex() {
        assert_eq!(
            encode_name("default"),
            "37a8eec1ce19687d132fe29051dca629d164e2c4958ba141d5f4133a33f0688f"
        );
        let ctx = Context::new("remote", "tcp://1.2.3.4:2375");
        assert_eq!(ctx.encoded_name, encode_name("remote"));
        assert_eq!(ctx.docker_host(), "tcp://1.2.3.4:2375");
    }

    #[test]
    fn test_additional_fields_stay_at_metadata_level() {
        let ctx = Context::new("remote", "tcp://h:2375")
            .with_description("lab box")
            .with_field("owner", "ops")
            .with_field("rank", 3);
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["Metadata"]["Description"], "lab box");
        assert_eq!(value["Metadata"]["owner"], "ops");
        assert_eq!(value["Metadata"]["rank"], 3);
        assert!(value["Metadata"].get("Fields").is_none());
        assert_eq!(value["Endpoints"]["docker"]["Host"], "tcp://h:2375");

        let parsed: Context = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.metadata, ctx.metadata);
    }
}
