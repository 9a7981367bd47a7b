//! # Docker SDK Daemon Interface
//!
//! File: sdk/src/common/docker/mod.rs
//!
//! ## Overview
//!
//! Everything that talks to the daemon directly, organised by concern:
//!
//! - **`api`**: The `DaemonClient` trait, the seam every other module calls through.
//! - **`connect`**: `BollardClient`, the production `DaemonClient`, and endpoint selection.
//! - **`engine`**: `Engine`, the shared handle of daemon client plus credentials.
//! - **`images`**: Pull (with credentials and retry), build, remove, save, platform checks.
//! - **`network`**: Network create/remove and idempotent cleanup.
//! - **`exec`**: Command execution inside running containers.
//! - **`stdcopy`**: Decoder for the daemon's 8-byte-header multiplexed stream format.
//! - **`labels`**: The labels stamped on every SDK-created resource.
//!
pub mod api;
pub mod connect;
pub mod engine;
pub mod exec;
pub mod images;
pub mod labels;
pub mod network;
pub mod stdcopy;

// --- Re-exports ---
pub use api::DaemonClient;
pub use connect::{connect_docker, BollardClient};
pub use engine::Engine;
pub use exec::{ExecOptions, ExecResult};
pub use images::{build_image, pull_image, remove_image, save_image, BuildOptions, Platform, PullOptions};
pub use network::{cleanup_network, Network, NetworkOptions};
