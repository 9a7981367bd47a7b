//! # Docker SDK Compression Utilities (`common::archive::compression`)
//!
//! File: sdk/src/common/archive/compression.rs
//!
//! ## Overview
//!
//! In-memory gzip helpers built on `flate2`. The daemon accepts gzipped tarballs
//! for copy-in and build contexts, so archives produced by `tar` pass through
//! `compress_gzip`; tests and copy-out callers use `decompress_gzip`.
//!
use crate::core::error::Result;
use anyhow::Context;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Gzip-compresses `data` with the default level.
pub fn compress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .context("Failed to write data to gzip encoder")?;
    encoder
        .finish()
        .context("Failed to finish gzip compression stream")
}

/// Reverses [`compress_gzip`].
pub fn decompress_gzip(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(compressed)
        .read_to_end(&mut out)
        .context("Failed to decompress gzip stream")?;
    Ok(out)
}

/// Whether `data` starts with the gzip magic bytes.
pub fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&[0x1f, 0x8b])
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_round_trip() {
        let data = b"hello from inside a container".repeat(20);
        let compressed = compress_gzip(&data).unwrap();
        assert!(is_gzip(&compressed));
        assert!(compressed.len() < data.len());
        assert_eq!(decompress_gzip(&compressed).unwrap(), data);
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(decompress_gzip(b"definitely not gzip").is_err());
        assert!(!is_gzip(b"plain"));
    }
}
