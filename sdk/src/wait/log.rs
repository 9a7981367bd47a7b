//! # Docker SDK Log Strategy
//!
//! File: sdk/src/wait/log.rs
//!
//! ## Overview
//!
//! Ready once the container's logs contain a substring (or regex match) at least
//! `occurrence` times. Logs are read in full on every attempt, so output written
//! before the container reached a fatal state still counts.
//!
use super::{ensure_alive, timed, within, Strategy, StrategyTarget, Timing};
use crate::core::error::Result;
use anyhow::Context;
use async_trait::async_trait;
use regex::bytes::Regex;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
enum Pattern {
    Substring(String),
    Regex(Regex),
}

/// Waits for `needle` to appear in the logs.
pub fn for_log(needle: &str) -> LogStrategy {
    LogStrategy {
        pattern: Pattern::Substring(needle.to_string()),
        occurrence: 1,
        timing: Timing::default(),
    }
}

/// Waits for `pattern` to match the logs.
pub fn for_log_regex(pattern: &str) -> Result<LogStrategy> {
    let regex = Regex::new(pattern).with_context(|| format!("Invalid log pattern {:?}", pattern))?;
    Ok(LogStrategy {
        pattern: Pattern::Regex(regex),
        occurrence: 1,
        timing: Timing::default(),
    })
}

#[derive(Debug, Clone)]
pub struct LogStrategy {
    pattern: Pattern,
    pub occurrence: usize,
    timing: Timing,
}

timed!(LogStrategy);

fn count_substring(haystack: &[u8], needle: &[u8]) -> usize {
    if needle.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut rest = haystack;
    while let Some(pos) = rest.windows(needle.len()).position(|w| w == needle) {
        count += 1;
        rest = &rest[pos + needle.len()..];
    }
    count
}

impl LogStrategy {
    /// Requires `n` matches instead of one.
    pub fn with_occurrence(mut self, n: usize) -> Self {
        self.occurrence = n.max(1);
        self
    }

    fn matches(&self, logs: &[u8]) -> usize {
        match &self.pattern {
            Pattern::Substring(needle) => count_substring(logs, needle.as_bytes()),
            Pattern::Regex(regex) => regex.find_iter(logs).count(),
        }
    }
}

#[async_trait]
impl Strategy for LogStrategy {
    #[instrument(skip(self, target), fields(occurrence = self.occurrence))]
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()> {
        within(self.timing.startup_timeout, async {
            loop {
                let fatal = ensure_alive(target).await.err();
                let logs = target.logs().await?;
                let found = self.matches(&logs);
                if found >= self.occurrence {
                    return Ok(());
                }
                if let Some(e) = fatal {
                    return Err(e);
                }
                debug!(found, "Log pattern not seen often enough yet");
                tokio::time::sleep(self.timing.poll_interval).await;
            }
        })
        .await
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::super::fixture::FixedTarget;
    use super::*;
    use crate::core::error::SdkError;
    use bollard::models::ContainerStateStatusEnum;
    use std::time::Duration;

    #[test]
    fn test_counts_non_overlapping_occurrences() {
        assert_eq!(count_substring(b"ready ready ready", b"ready"), 3);
        assert_eq!(count_substring(b"aaaa", b"aa"), 2);
        assert_eq!(count_substring(b"abc", b""), 0);
    }

    #[tokio::test]
    async fn test_occurrence_and_regex() {
        let target = FixedTarget::running();
        *target.logs.lock() = b"listening\nstarting\nlistening on 5432\n".to_vec();

        for_log("listening").with_occurrence(2).wait_until_ready(&target).await.unwrap();
        for_log_regex(r"on \d+$|on \d+\n")
            .unwrap()
            .wait_until_ready(&target)
            .await
            .unwrap();

        let three = for_log("listening")
            .with_occurrence(3)
            .with_startup_timeout(Duration::from_millis(60))
            .with_poll_interval(Duration::from_millis(10));
        assert!(three.wait_until_ready(&target).await.is_err());
    }

    #[tokio::test]
    async fn test_exited_container_fails_unless_already_logged() {
        let target = FixedTarget::running();
        *target.logs.lock() = b"done\n".to_vec();
        {
            let mut state = target.state.lock();
            state.status = Some(ContainerStateStatusEnum::EXITED);
            state.running = Some(false);
            state.exit_code = Some(1);
        }

        for_log("done").wait_until_ready(&target).await.unwrap();
        let err = for_log("never").wait_until_ready(&target).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<SdkError>(), Some(SdkError::ContainerExited(1))));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        assert!(for_log_regex("(").is_err());
    }
}
