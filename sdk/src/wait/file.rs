//! # Docker SDK File Strategy
//!
//! File: sdk/src/wait/file.rs
//!
//! ## Overview
//!
//! Ready once the file can be copied out of the container, and its contents
//! satisfy the optional matcher.
//!
use super::{poll, timed, Matcher, Strategy, StrategyTarget, Timing};
use crate::core::error::Result;
use async_trait::async_trait;
use tracing::{debug, instrument};

pub fn for_file(path: &str) -> FileStrategy {
    FileStrategy {
        path: path.to_string(),
        matcher: None,
        timing: Timing::default(),
    }
}

#[derive(Debug, Clone)]
pub struct FileStrategy {
    pub path: String,
    matcher: Option<Matcher<[u8]>>,
    timing: Timing,
}

timed!(FileStrategy);

impl FileStrategy {
    pub fn with_matcher(mut self, matcher: impl Fn(&[u8]) -> bool + Send + Sync + 'static) -> Self {
        self.matcher = Some(Matcher::new(matcher));
        self
    }
}

#[async_trait]
impl Strategy for FileStrategy {
    #[instrument(skip(self, target), fields(path = %self.path))]
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()> {
        poll(target, self.timing, || async {
            match target.copy_from(&self.path).await {
                Ok(content) => Ok(self.matcher.as_ref().map_or(true, |m| m.matches(&content))),
                Err(e) => {
                    debug!(error = %e, "File not available yet");
                    Ok(false)
                }
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
    use std::time::Duration;

    #[tokio::test]
    async fn test_file_presence_and_matcher() {
        let mut target = FixedTarget::running();
        target.files.insert("/tmp/ready".into(), b"ok".to_vec());

        for_file("/tmp/ready").wait_until_ready(&target).await.unwrap();

        let mismatch = for_file("/tmp/ready")
            .with_matcher(|c| c == b"done")
            .with_startup_timeout(Duration::from_millis(60))
            .with_poll_interval(Duration::from_millis(10));
        assert!(mismatch.wait_until_ready(&target).await.is_err());
    }
}
