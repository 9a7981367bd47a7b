//! # Docker SDK Testing Helpers (`testing`)
//!
//! File: sdk/src/testing/mod.rs
//!
//! ## Overview
//!
//! Support code for tests of the SDK and of code built on it:
//!
//! - **`TempDockerConfig`**: Deterministic temporary config and context trees.
//! - **`MockHelperRunner`**: Scripted credential helpers.
//! - **`FakeDaemon`**: An in-memory `DaemonClient`.
//! - **`cleanup_container` / `cleanup_network`**: Idempotent teardown that treats
//!   already-reclaimed resources as success.
//!
mod config;
mod daemon;
mod helpers;

pub use crate::common::docker::network::cleanup_network;
pub use config::TempDockerConfig;
pub use daemon::{daemon_error, FakeDaemon};
pub use helpers::MockHelperRunner;

use crate::container::{Container, TerminateOptions};
use crate::core::error::{is_cleanup_safe, Result};
use tracing::warn;

/// Terminates `container` if there is one.
///
/// Not-found and removal-in-progress failures count as success, so calling this
/// twice, or after the container was removed elsewhere, is fine.
pub async fn cleanup_container(container: Option<&Container>) -> Result<()> {
    let Some(container) = container else {
        return Ok(());
    };
    match container.terminate(TerminateOptions::default()).await {
        Ok(()) => Ok(()),
        Err(e) if is_cleanup_safe(&e) => {
            warn!(container_id = %container.short_id(), "Container was already removed");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
