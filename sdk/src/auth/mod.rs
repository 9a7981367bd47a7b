//! # Docker SDK Registry Authentication
//!
//! File: sdk/src/auth/mod.rs
//!
//! ## Overview
//!
//! Everything needed to turn an image reference into registry credentials:
//! - `reference`: Image reference parsing and registry extraction.
//! - `config`: The client configuration document and its location rules.
//! - `helpers`: Credential helper subprocess protocol.
//! - `cache`: Per-configuration credential memoization.
//! - `credentials`: The resolver (host normalization, source precedence, batch lookup).
//!
pub mod cache;
pub mod config;
pub mod credentials;
pub mod helpers;
pub mod reference;

pub use config::{ClientConfig, RegistryCredential};
pub use credentials::{registry_credentials, registry_credentials_for_hostname, resolve_registry_host};
pub use reference::ImageReference;
