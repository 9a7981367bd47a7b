//! # Docker SDK TAR Archive Operations (`common::archive::tar`)
//!
//! File: sdk/src/common/archive/tar.rs
//!
//! ## Overview
//!
//! Builds the archives the daemon consumes and unwraps the ones it produces.
//!
//! ## Architecture
//!
//! - **`tar_single_file`**: One member at the container path with an explicit mode.
//!   Used by the file-copy hook and `Container::copy_to`.
//! - **`tar_directory`**: Walks a host directory with `walkdir`, adding one entry per
//!   file and directory under the container path. Symlinks are skipped with a warning.
//! - **`create_context_tar`**: Image build context, honouring `.dockerignore`. The
//!   Dockerfile and the ignore file itself are always kept.
//! - **`first_entry_contents`**: Copy-out unwrapping; advances past exactly one
//!   header and returns that entry's bytes.
//!
//! Every builder returns a gzipped tarball held in memory.
//!
//! ```rust
//! use docker_sdk::common::archive::tar::{first_entry_contents, tar_single_file};
//! use docker_sdk::common::archive::compression::decompress_gzip;
//!
//! let archive = tar_single_file(b"hello", "/etc/greeting", 0o644).unwrap();
//! let plain = decompress_gzip(&archive).unwrap();
//! assert_eq!(first_entry_contents(&plain).unwrap(), b"hello");
//! ```
//!
use super::ignore::{IgnoreRules, DOCKERIGNORE_FILE};
use crate::core::error::Result;
use anyhow::{anyhow, Context};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Read;
use std::path::Path;
use tar::{Builder, EntryType, Header};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Default mode for files copied into containers.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

fn archive_path(container_path: &str) -> String {
    container_path.trim_start_matches('/').to_string()
}

fn new_builder() -> Builder<GzEncoder<Vec<u8>>> {
    Builder::new(GzEncoder::new(Vec::new(), Compression::default()))
}

fn finish(builder: Builder<GzEncoder<Vec<u8>>>) -> Result<Vec<u8>> {
    let encoder = builder
        .into_inner()
        .context("Failed to finalize tar archive structure")?;
    encoder
        .finish()
        .context("Failed to finish gzip compression stream")
}

fn file_header(size: u64, mode: u32) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(size);
    header.set_mode(mode);
    header.set_mtime(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default(),
    );
    header
}

/// Packs `content` as a single member at `container_path`.
///
/// # Errors
///
/// Fails when `container_path` is empty or the archive cannot be written.
pub fn tar_single_file(content: &[u8], container_path: &str, mode: u32) -> Result<Vec<u8>> {
    let path = archive_path(container_path);
    if path.is_empty() {
        return Err(anyhow!("container path must not be empty"));
    }
    let mut builder = new_builder();
    let mut header = file_header(content.len() as u64, mode);
    builder
        .append_data(&mut header, &path, content)
        .with_context(|| format!("Failed to add '{}' to tar archive", path))?;
    finish(builder)
}

/// Packs the tree under `source` below `container_path`.
///
/// `mode`, when set, overrides the permission bits of every regular file.
pub fn tar_directory(source: &Path, container_path: &str, mode: Option<u32>) -> Result<Vec<u8>> {
    let prefix = archive_path(container_path);
    let mut builder = new_builder();

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk '{}'", source.display()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .context("Walked path outside of the source directory")?;
        let relative = relative.to_string_lossy().replace('\\', "/");
        let target = match (prefix.is_empty(), relative.is_empty()) {
            (true, _) => relative.clone(),
            (false, true) => prefix.clone(),
            (false, false) => format!("{}/{}", prefix, relative),
        };
        if target.is_empty() {
            continue;
        }

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            warn!("Skipping symlink '{}' while archiving", entry.path().display());
            continue;
        }
        if file_type.is_dir() {
            builder
                .append_dir(&target, entry.path())
                .with_context(|| format!("Failed to add directory '{}'", entry.path().display()))?;
            continue;
        }

        let mut file = fs::File::open(entry.path())
            .with_context(|| format!("Failed to open '{}'", entry.path().display()))?;
        match mode {
            Some(mode) => {
                let size = file.metadata()?.len();
                let mut header = file_header(size, mode);
                builder
                    .append_data(&mut header, &target, &mut file)
                    .with_context(|| format!("Failed to add '{}'", entry.path().display()))?;
            }
            None => {
                builder
                    .append_file(&target, &mut file)
                    .with_context(|| format!("Failed to add '{}'", entry.path().display()))?;
            }
        }
    }

    finish(builder)
}

/// # Create Gzipped TAR Build Context (`create_context_tar`)
///
/// Archives `context_path` for an image build, leaving out paths excluded by its
/// `.dockerignore`. `dockerfile` (relative to the context) is always included.
pub fn create_context_tar(context_path: &Path, dockerfile: &str) -> Result<Vec<u8>> {
    if !context_path.is_dir() {
        return Err(anyhow!(
            "build context '{}' is not a directory",
            context_path.display()
        ));
    }
    let rules = IgnoreRules::load(context_path)?;
    let dockerfile = dockerfile.trim_start_matches("./").replace('\\', "/");
    let mut builder = new_builder();
    let mut skipped = 0usize;

    let mut walker = WalkDir::new(context_path).follow_links(false).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.with_context(|| format!("Failed to walk '{}'", context_path.display()))?;
        let relative = entry
            .path()
            .strip_prefix(context_path)
            .context("Walked path outside of the build context")?
            .to_string_lossy()
            .replace('\\', "/");
        if relative.is_empty() {
            continue;
        }

        let always_keep = relative == dockerfile || relative == DOCKERIGNORE_FILE;
        if !always_keep && rules.is_excluded(&relative) {
            skipped += 1;
            // Negated patterns may re-include files below an excluded directory.
            if entry.file_type().is_dir() && !rules.has_negations() {
                walker.skip_current_dir();
            }
            continue;
        }

        let file_type = entry.file_type();
        if file_type.is_symlink() {
            warn!("Skipping symlink '{}' in build context", entry.path().display());
            continue;
        }
        if file_type.is_dir() {
            builder
                .append_dir(&relative, entry.path())
                .with_context(|| format!("Failed to add directory '{}'", relative))?;
        } else {
            builder
                .append_path_with_name(entry.path(), &relative)
                .with_context(|| format!("Failed to add '{}' to the build context", relative))?;
        }
    }

    debug!(skipped, "Build context archived");
    finish(builder)
}

/// Returns the contents of the first member of an uncompressed tar stream.
///
/// # Errors
///
/// Fails when the archive is empty or unreadable.
pub fn first_entry_contents(archive: &[u8]) -> Result<Vec<u8>> {
    let mut archive = tar::Archive::new(archive);
    let mut entries = archive.entries().context("Failed to read tar stream")?;
    let mut entry = entries
        .next()
        .ok_or_else(|| anyhow!("tar stream contains no entries"))?
        .context("Failed to read tar entry header")?;
    let mut contents = Vec::new();
    entry
        .read_to_end(&mut contents)
        .context("Failed to read tar entry contents")?;
    Ok(contents)
}
