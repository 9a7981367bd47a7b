//! # Docker SDK Core Infrastructure
//!
//! File: sdk/src/core/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the foundational pieces shared by every other part of
//! the SDK:
//! - `env`: Snapshot of the environment variables that steer daemon and
//!   credential discovery.
//! - `error`: Error taxonomy, joined errors and chain classifiers.
//! - `retry`: Exponential backoff with full jitter and permanent-error short-circuit.
//!
//! ```rust
//! use docker_sdk::core::env::DockerEnv;
//! use docker_sdk::core::error::{Result, SdkError};
//! use docker_sdk::core::retry::Backoff;
//! ```
//!
pub mod env;
pub mod error;
pub mod retry;
