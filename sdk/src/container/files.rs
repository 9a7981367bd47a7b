//! # Docker SDK File Transfer
//!
//! File: sdk/src/container/files.rs
//!
//! ## Overview
//!
//! `ContainerFile` describes content to place inside a container, either from
//! memory or from a host path (file or directory). Copy-in sends a gzipped tar
//! archive extracted at `/`, so member names carry the full container path.
//! Copy-out unwraps the single-entry tar stream the daemon returns.
//!
use super::Container;
use crate::common::archive::tar::{first_entry_contents, tar_directory, tar_single_file, DEFAULT_FILE_MODE};
use crate::core::error::{Result, SdkError};
use anyhow::{anyhow, bail, Context};
use bytes::Bytes;
use futures_util::StreamExt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Content to copy into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerFile {
    pub content: Option<Vec<u8>>,
    pub host_path: Option<PathBuf>,
    pub container_path: String,
    /// Permission bits, `0o644` unless set.
    pub mode: u32,
}

impl ContainerFile {
    pub fn from_bytes(content: impl Into<Vec<u8>>, container_path: &str) -> Self {
        Self {
            content: Some(content.into()),
            host_path: None,
            container_path: container_path.to_string(),
            mode: DEFAULT_FILE_MODE,
        }
    }

    pub fn from_host_path(host_path: impl Into<PathBuf>, container_path: &str) -> Self {
        Self {
            content: None,
            host_path: Some(host_path.into()),
            container_path: container_path.to_string(),
            mode: DEFAULT_FILE_MODE,
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Exactly one source and a container path are required.
    pub fn validate(&self) -> Result<()> {
        match (&self.content, &self.host_path) {
            (Some(_), Some(_)) => bail!("file for {:?} has both content and a host path", self.container_path),
            (None, None) => bail!("file for {:?} has neither content nor a host path", self.container_path),
            _ => {}
        }
        if self.container_path.is_empty() {
            bail!("file container path must not be empty");
        }
        Ok(())
    }

    /// The gzipped tar archive to upload.
    pub fn archive(&self) -> Result<Vec<u8>> {
        self.validate()?;
        if let Some(content) = &self.content {
            return tar_single_file(content, &self.container_path, self.mode);
        }
        let path = self.host_path.as_deref().unwrap_or_else(|| Path::new(""));
        if path.is_dir() {
            return tar_directory(path, &self.container_path, Some(self.mode));
        }
        let content = fs::read(path).with_context(|| format!("Failed to read '{}'", path.display()))?;
        tar_single_file(&content, &self.container_path, self.mode)
    }
}

impl Container {
    /// Copies `file` into the container.
    #[instrument(skip(self, file), fields(container_id = %self.short_id(), path = %file.container_path))]
    pub async fn copy_file(&self, file: &ContainerFile) -> Result<()> {
        let archive = file.archive()?;
        self.upload(archive).await?;
        debug!("Copied {} into the container", file.container_path);
        Ok(())
    }

    /// Writes `content` to `container_path`.
    pub async fn copy_to_container(&self, content: &[u8], container_path: &str, mode: u32) -> Result<()> {
        self.copy_file(&ContainerFile::from_bytes(content, container_path).with_mode(mode))
            .await
    }

    /// Copies a host file or directory to `container_path`.
    pub async fn copy_path_to_container(&self, host_path: &Path, container_path: &str, mode: u32) -> Result<()> {
        self.copy_file(&ContainerFile::from_host_path(host_path, container_path).with_mode(mode))
            .await
    }

    async fn upload(&self, archive: Vec<u8>) -> Result<()> {
        self.engine()
            .daemon()
            .copy_to_container(self.id(), "/", Bytes::from(archive))
            .await
            .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
            .with_context(|| format!("Failed to copy into container {}", self.short_id()))
    }

    /// Reads the file at `path` inside the container.
    #[instrument(skip(self), fields(container_id = %self.short_id()))]
    pub async fn copy_from_container(&self, path: &str) -> Result<Vec<u8>> {
        let mut stream = self.engine().daemon().copy_from_container(self.id(), path);
        let mut archive = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
                .with_context(|| format!("Failed to copy '{}' from container {}", path, self.short_id()))?;
            archive.extend_from_slice(&chunk);
        }
        first_entry_contents(&archive)
    }
}
