//! # Docker SDK Command Modules
//!
//! File: sdk/src/commands/mod.rs
//!
//! ## Overview
//!
//! Command groups of the `dsdk` binary. Each module defines its clap arguments
//! and a `handle_*` function; `main.rs` routes to them.
//!
//! - `context`: Context store commands (`ls`, `inspect`, `current`, `create`, `delete`, `use`).
//! - `credentials`: Credential resolution for an image or registry host.
//! - `image`: Image reference parsing, pull and removal.
//! - `run`: Runs a container through the lifecycle orchestrator.
//!
pub mod context;
pub mod credentials;
pub mod image;
pub mod run;
