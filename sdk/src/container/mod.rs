//! # Docker SDK Containers (`container`)
//!
//! File: sdk/src/container/mod.rs
//!
//! ## Overview
//!
//! The lifecycle orchestrator. A `Definition` describes the container; `run`
//! creates and starts it, and the returned `Container` is stopped and
//! terminated through the same hook pipeline.
//!
//! ## Architecture
//!
//! - **`definition`**: The `Definition` builder and its validation.
//! - **`hooks`**: The nine hook points, `LifecycleHooks` and `combine`.
//! - **`defaults`**: Built-in hooks (logging, ports, files, readiness, pull).
//! - **`lifecycle`**: `run`, `create`, start/stop/terminate.
//! - **`access`**: Accessors and the wait-strategy target.
//! - **`files`**: Copy into and out of the container.
//! - **`logs`**: Log consumers and the producer task.
//! - **`ports`**: Exposed-port spec parsing.
//! - **`substitutor`**: Image reference rewriting.
//!
//! ## Examples
//!
//! ```rust,no_run
//! use docker_sdk::container::{self, Definition, TerminateOptions};
//! use docker_sdk::wait;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let redis = container::run(
//!     Definition::new("redis:7-alpine")
//!         .with_exposed_ports(["6379/tcp"])
//!         .with_wait_strategy(wait::for_log("Ready to accept connections")),
//! )
//! .await?;
//! let endpoint = redis.port_endpoint("6379", "redis").await?;
//! println!("redis at {endpoint}");
//! redis.terminate(TerminateOptions::default()).await?;
//! # Ok(())
//! # }
//! ```
//!
mod access;
mod defaults;
pub mod definition;
pub mod files;
pub mod hooks;
mod lifecycle;
pub mod logs;
pub mod ports;
pub mod substitutor;

pub use access::host_from_daemon_url;
pub use definition::{Definition, FromDockerfile};
pub use files::ContainerFile;
pub use hooks::{combine, CreateInput, HookSlot, LifecycleHooks};
pub use lifecycle::{create, run, Container, RunError, TerminateOptions, DEFAULT_STOP_TIMEOUT_SECS};
pub use logs::{LogCollector, LogConsumer, LogEntry};
pub use substitutor::{CustomHubSubstitutor, ImageSubstitutor, PrependHubSubstitutor};
