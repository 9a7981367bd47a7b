//! # Docker SDK Common Utilities (`common`)
//!
//! File: sdk/src/common/mod.rs
//!
//! ## Overview
//!
//! Shared building blocks used by the container orchestrator and the wait
//! strategies:
//!
//! - **`archive`**: TAR/gzip encoding for copy-in, copy-out and build contexts.
//! - **`docker`**: The daemon client seam, its bollard binding and the image,
//!   network and exec operations built on it.
//!
pub mod archive;
pub mod docker;
