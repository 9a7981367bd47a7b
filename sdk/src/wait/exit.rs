//! # Docker SDK Exit Strategy
//!
//! File: sdk/src/wait/exit.rs
//!
//! ## Overview
//!
//! Ready once the container is no longer running. Fatal states are not checked:
//! leaving the running state is the goal. `with_exit_timeout` bounds the wait;
//! without it the startup timeout applies.
//!
use super::{within, Strategy, StrategyTarget};
use crate::core::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::instrument;

pub fn for_exit() -> ExitStrategy {
    ExitStrategy {
        exit_timeout: None,
        poll_interval: super::DEFAULT_POLL_INTERVAL,
    }
}

#[derive(Debug, Clone)]
pub struct ExitStrategy {
    pub exit_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl ExitStrategy {
    pub fn with_exit_timeout(mut self, timeout: Duration) -> Self {
        self.exit_timeout = Some(timeout);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// The bound applied to the wait.
    pub fn effective_timeout(&self) -> Duration {
        self.exit_timeout.unwrap_or(super::DEFAULT_STARTUP_TIMEOUT)
    }
}

#[async_trait]
impl Strategy for ExitStrategy {
    #[instrument(skip(self, target))]
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()> {
        within(self.effective_timeout(), async {
            loop {
                let state = target.state().await?;
                if !state.running.unwrap_or(false) {
                    return Ok(());
                }
                tokio::time::sleep(self.poll_interval).await;
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
    use bollard::models::ContainerStateStatusEnum;

    #[test]
    fn test_timeout_defaults_to_startup_timeout() {
        assert_eq!(for_exit().effective_timeout(), crate::wait::DEFAULT_STARTUP_TIMEOUT);
        assert_eq!(
            for_exit().with_exit_timeout(Duration::from_secs(5)).effective_timeout(),
            Duration::from_secs(5)
        );
    }

    #[tokio::test]
    async fn test_waits_until_not_running() {
        let target = FixedTarget::running();
        let strategy = for_exit()
            .with_exit_timeout(Duration::from_millis(60))
            .with_poll_interval(Duration::from_millis(10));
        assert!(strategy.wait_until_ready(&target).await.is_err());

        {
            let mut state = target.state.lock();
            state.running = Some(false);
            state.status = Some(ContainerStateStatusEnum::EXITED);
        }
        strategy.wait_until_ready(&target).await.unwrap();
    }
}
