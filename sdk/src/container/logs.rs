//! # Docker SDK Log Production
//!
//! File: sdk/src/container/logs.rs
//!
//! ## Overview
//!
//! A container with log consumers runs one producer task. The task follows the
//! container's log stream, decodes the multiplexed frames and hands every frame
//! to each consumer in stream order.
//!
//! ## Architecture
//!
//! - Each read is bounded by the consumer timeout (default 5s, clamped to
//!   5s..=60s). On expiry the stream is reopened from the current time so a
//!   stalled connection does not hang the producer.
//! - Stopping sends a signal over a oneshot channel; a stopped producer is not
//!   an error.
//! - The end of the stream means the container stopped; the task then exits.
//!
use super::Container;
use crate::common::docker::api::{DaemonClient, LogsRequest};
use crate::common::docker::stdcopy::{FrameDecoder, StreamKind};
use crate::core::error::{Result, SdkError};
use anyhow::{anyhow, Context};
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

pub const DEFAULT_LOG_CONSUMER_TIMEOUT: Duration = Duration::from_secs(5);
pub const MIN_LOG_CONSUMER_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_LOG_CONSUMER_TIMEOUT: Duration = Duration::from_secs(60);

/// One frame of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub kind: StreamKind,
    pub content: Vec<u8>,
}

/// Receives container output as it is produced.
pub trait LogConsumer: Send + Sync {
    fn accept(&self, entry: &LogEntry);
}

/// Consumer that keeps every entry in memory.
#[derive(Debug, Clone, Default)]
pub struct LogCollector {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Content of every entry, concatenated.
    pub fn content(&self) -> Vec<u8> {
        self.entries.lock().iter().flat_map(|e| e.content.iter().copied()).collect()
    }
}

impl LogConsumer for LogCollector {
    fn accept(&self, entry: &LogEntry) {
        self.entries.lock().push(entry.clone());
    }
}

pub(crate) fn clamp_timeout(timeout: Option<Duration>) -> Duration {
    timeout
        .unwrap_or(DEFAULT_LOG_CONSUMER_TIMEOUT)
        .clamp(MIN_LOG_CONSUMER_TIMEOUT, MAX_LOG_CONSUMER_TIMEOUT)
}

/// A running producer task.
pub(crate) struct LogProducer {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<Result<()>>,
}

async fn produce(
    daemon: Arc<dyn DaemonClient>,
    container_id: String,
    consumers: Vec<Arc<dyn LogConsumer>>,
    read_timeout: Duration,
    mut stop: oneshot::Receiver<()>,
) -> Result<()> {
    let mut since = 0;
    loop {
        let mut stream = daemon.container_logs(&container_id, LogsRequest::follow_from(since));
        let mut decoder = FrameDecoder::new();
        loop {
            tokio::select! {
                _ = &mut stop => {
                    debug!("Log production stopped");
                    return Ok(());
                }
                next = tokio::time::timeout(read_timeout, stream.next()) => match next {
                    Err(_) => {
                        since = chrono::Utc::now().timestamp();
                        debug!(since, "Log read timed out, reopening stream");
                        break;
                    }
                    Ok(None) => {
                        debug!("Log stream ended");
                        return Ok(());
                    }
                    Ok(Some(Err(e))) => {
                        return Err(anyhow!(SdkError::DockerApi { source: e }))
                            .context("Failed to read container logs");
                    }
                    Ok(Some(Ok(chunk))) => {
                        for frame in decoder.push(&chunk)? {
                            let entry = LogEntry {
                                kind: frame.kind,
                                content: frame.payload,
                            };
                            for consumer in &consumers {
                                consumer.accept(&entry);
                            }
                        }
                    }
                }
            }
        }
    }
}

impl Container {
    /// Starts delivering logs to `consumers`. A running producer is stopped first.
    #[instrument(skip(self, consumers), fields(container_id = %self.short_id(), consumers = consumers.len()))]
    pub async fn start_log_producer(&self, consumers: Vec<Arc<dyn LogConsumer>>, timeout: Option<Duration>) -> Result<()> {
        self.stop_log_producer().await?;
        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(produce(
            self.engine().daemon_arc(),
            self.id().to_string(),
            consumers,
            clamp_timeout(timeout),
            stop_rx,
        ));
        *self.inner.log_producer.lock() = Some(LogProducer { stop, handle });
        debug!("Log producer started");
        Ok(())
    }

    /// Stops the producer and reports the error it ended with, if any.
    pub async fn stop_log_producer(&self) -> Result<()> {
        let Some(producer) = self.inner.log_producer.lock().take() else {
            return Ok(());
        };
        let _ = producer.stop.send(());
        match producer.handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Log producer task failed");
                Err(anyhow!("log producer task failed: {}", e))
            }
        }
    }

    pub fn has_log_producer(&self) -> bool {
        self.inner.log_producer.lock().is_some()
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_clamped() {
        assert_eq!(clamp_timeout(None), Duration::from_secs(5));
        assert_eq!(clamp_timeout(Some(Duration::from_secs(1))), Duration::from_secs(5));
        assert_eq!(clamp_timeout(Some(Duration::from_secs(30))), Duration::from_secs(30));
        assert_eq!(clamp_timeout(Some(Duration::from_secs(600))), Duration::from_secs(60));
    }

    #[test]
    fn test_collector() {
        let collector = LogCollector::new();
        let handle = collector.clone();
        collector.accept(&LogEntry {
            kind: StreamKind::Stdout,
            content: b"a".to_vec(),
        });
        collector.accept(&LogEntry {
            kind: StreamKind::Stderr,
            content: b"b".to_vec(),
        });
        assert_eq!(handle.content(), b"ab");
        assert_eq!(handle.entries()[1].kind, StreamKind::Stderr);
    }
}
