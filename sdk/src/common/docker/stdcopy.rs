//! # Docker SDK Multiplexed Stream Codec
//!
//! File: sdk/src/common/docker/stdcopy.rs
//!
//! ## Overview
//!
//! The daemon multiplexes stdout and stderr of attached containers and exec
//! instances into one byte stream of frames:
//!
//! ```text
//! [stream id: 1 byte][reserved: 3 bytes][payload length: 4 bytes, big endian][payload]
//! ```
//!
//! Stream id 0 is stdin, 1 stdout, 2 stderr. `FrameDecoder` decodes incrementally,
//! keeping partial frames across chunk boundaries, which is what the log producer
//! needs. `demultiplex` and `merge` work on complete buffers.
//!
use crate::core::error::Result;
use anyhow::bail;

/// Size of a frame header.
pub const HEADER_LEN: usize = 8;

/// Origin of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn id(self) -> u8 {
        match self {
            StreamKind::Stdin => 0,
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(StreamKind::Stdin),
            1 => Some(StreamKind::Stdout),
            2 => Some(StreamKind::Stderr),
            _ => None,
        }
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: StreamKind,
    pub payload: Vec<u8>,
}

/// Encodes `payload` as one frame.
pub fn encode_frame(kind: StreamKind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(kind.id());
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Incremental frame decoder.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every frame completed by it.
    ///
    /// # Errors
    ///
    /// Fails on an unknown stream id; the decoder should be discarded afterwards.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        let mut offset = 0;

        while self.buffer.len() - offset >= HEADER_LEN {
            let header = &self.buffer[offset..offset + HEADER_LEN];
            let Some(kind) = StreamKind::from_id(header[0]) else {
                bail!("unrecognized stream id {} in multiplexed output", header[0]);
            };
            let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
            if self.buffer.len() - offset - HEADER_LEN < len {
                break;
            }
            let start = offset + HEADER_LEN;
            frames.push(Frame {
                kind,
                payload: self.buffer[start..start + len].to_vec(),
            });
            offset = start + len;
        }

        self.buffer.drain(..offset);
        Ok(frames)
    }

    /// Bytes of an incomplete trailing frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Splits a complete multiplexed buffer into stdout and stderr.
pub fn demultiplex(data: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut decoder = FrameDecoder::new();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for frame in decoder.push(data)? {
        match frame.kind {
            StreamKind::Stdout | StreamKind::Stdin => stdout.extend_from_slice(&frame.payload),
            StreamKind::Stderr => stderr.extend_from_slice(&frame.payload),
        }
    }
    if decoder.pending() > 0 {
        bail!("multiplexed output ends with a truncated frame");
    }
    Ok((stdout, stderr))
}

/// Strips frame headers, keeping stdout and stderr interleaved in stream order.
pub fn merge(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = FrameDecoder::new();
    let merged = decoder
        .push(data)?
        .into_iter()
        .flat_map(|f| f.payload)
        .collect();
    if decoder.pending() > 0 {
        bail!("multiplexed output ends with a truncated frame");
    }
    Ok(merged)
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let frame = encode_frame(StreamKind::Stderr, b"oops");
        assert_eq!(&frame[..8], &[2, 0, 0, 0, 0, 0, 0, 4]);
        assert_eq!(&frame[8..], b"oops");
    }

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut data = encode_frame(StreamKind::Stdout, b"hello ");
        data.extend(encode_frame(StreamKind::Stderr, b"warn"));
        data.extend(encode_frame(StreamKind::Stdout, b"world"));

        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in data.chunks(3) {
            frames.extend(decoder.push(chunk).unwrap());
        }
        assert_eq!(decoder.pending(), 0);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].kind, StreamKind::Stderr);
        assert_eq!(frames[2].payload, b"world");
    }

    #[test]
    fn test_demultiplex_and_merge() {
        let mut data = encode_frame(StreamKind::Stdout, b"out1 ");
        data.extend(encode_frame(StreamKind::Stderr, b"err "));
        data.extend(encode_frame(StreamKind::Stdout, b"out2"));

        let (out, err) = demultiplex(&data).unwrap();
        assert_eq!(out, b"out1 out2");
        assert_eq!(err, b"err ");
        assert_eq!(merge(&data).unwrap(), b"out1 err out2");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(merge(&[9, 0, 0, 0, 0, 0, 0, 1, b'x']).is_err());
        let frame = encode_frame(StreamKind::Stdout, b"truncated");
        assert!(merge(&frame[..frame.len() - 2]).is_err());
        assert!(merge(&[]).unwrap().is_empty());
    }
}
