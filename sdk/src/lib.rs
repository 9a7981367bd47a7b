//! # Docker SDK
//!
//! File: sdk/src/lib.rs
//!
//! ## Overview
//!
//! Client-side SDK for driving a Docker-compatible engine from code: it resolves
//! registry credentials, selects the daemon through the context store, runs
//! containers through a hook-based lifecycle and waits for them to be ready.
//!
//! ## Architecture
//!
//! - **`core`**: Error taxonomy, environment snapshot, retry with backoff.
//! - **`auth`**: Image references, `config.json`, credential helpers and cache.
//! - **`context`**: The daemon context store.
//! - **`common`**: Archives and the daemon-facing operations (images, networks,
//!   exec, the `DaemonClient` seam and its bollard binding).
//! - **`container`**: Definitions, lifecycle hooks and running containers.
//! - **`wait`**: Readiness strategies and the strategy walker.
//! - **`testing`**: Temporary config trees, an in-memory daemon and cleanup helpers.
//!
//! ## Examples
//!
//! ```rust
//! use docker_sdk::auth::ImageReference;
//!
//! let reference = ImageReference::parse("nginx:latest").unwrap();
//! assert_eq!(reference.registry, "docker.io");
//! assert_eq!(reference.repository, "library/nginx");
//! ```
//!
pub mod auth;
pub mod common;
pub mod container;
pub mod context;
pub mod core;
pub mod testing;
pub mod wait;
