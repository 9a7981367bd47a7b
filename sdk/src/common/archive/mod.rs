//! # Docker SDK Archive Utilities (`common::archive`)
//!
//! File: sdk/src/common/archive/mod.rs
//!
//! ## Overview
//!
//! TAR and gzip handling for everything the daemon exchanges as archives: files
//! copied into a container, files copied out of one, and image build contexts.
//!
//! ## Architecture
//!
//! - **`tar`**: Builds gzipped tarballs in memory (single file, directory tree,
//!   build context) and unwraps the single-entry archives returned by copy-out.
//! - **`compression`**: Gzip encode/decode over byte buffers.
//! - **`ignore`**: `.dockerignore` pattern matching for build contexts.
//!
pub mod compression;
pub mod ignore;
pub mod tar;
