//! # Docker SDK Temporary Config Trees
//!
//! File: sdk/src/testing/config.rs
//!
//! ## Overview
//!
//! `TempDockerConfig` owns a temporary directory laid out like a docker config
//! directory and hands out a `DockerEnv` rooted at it. The directory is deleted
//! when the value is dropped.
//!
use crate::context::{store, Context};
use crate::core::env::DockerEnv;
use crate::core::error::Result;
use anyhow::Context as _;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway docker config directory.
#[derive(Debug)]
pub struct TempDockerConfig {
    dir: TempDir,
}

impl TempDockerConfig {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("docker-sdk-config-")
            .tempdir()
            .context("Failed to create temporary config directory")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// An environment with only `DOCKER_CONFIG` set, pointing here.
    pub fn env(&self) -> DockerEnv {
        DockerEnv::with_config_dir(self.dir.path())
    }

    /// Writes `config.json`.
    pub fn write_config(&self, json: &str) -> Result<()> {
        let path = self.dir.path().join(crate::auth::config::CONFIG_FILE_NAME);
        fs::write(&path, json).with_context(|| format!("Failed to write '{}'", path.display()))
    }

    /// Writes `ctx` as `contexts/meta/<rel_dir>/meta.json`, returning the file path.
    ///
    /// Unlike `context::store::create`, the directory is chosen by the caller so
    /// nested and misplaced layouts can be produced.
    pub fn write_context(&self, rel_dir: &str, ctx: &Context) -> Result<PathBuf> {
        let dir = store::meta_root(&self.env())?.join(rel_dir);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create '{}'", dir.display()))?;
        let path = dir.join(store::META_FILE);
        let json = serde_json::to_string_pretty(ctx).context("Failed to encode context")?;
        fs::write(&path, json).with_context(|| format!("Failed to write '{}'", path.display()))?;
        Ok(path)
    }
}
