//! # Docker SDK Composite Strategy
//!
//! File: sdk/src/wait/all.rs
//!
//! ## Overview
//!
//! Runs child strategies one after another. Each child keeps its own startup
//! timeout, and the whole sequence is bounded by `deadline` (60 s by default).
//!
use super::{within, Strategy, StrategyTarget, WaitStrategy, DEFAULT_STARTUP_TIMEOUT};
use crate::core::error::Result;
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

pub fn for_all(strategies: Vec<WaitStrategy>) -> AllStrategy {
    AllStrategy {
        strategies,
        deadline: DEFAULT_STARTUP_TIMEOUT,
    }
}

#[derive(Debug, Clone)]
pub struct AllStrategy {
    pub strategies: Vec<WaitStrategy>,
    pub deadline: Duration,
}

impl AllStrategy {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }
}

#[async_trait]
impl Strategy for AllStrategy {
    #[instrument(skip(self, target), fields(children = self.strategies.len()))]
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()> {
        within(self.deadline, async {
            for (i, strategy) in self.strategies.iter().enumerate() {
                debug!("Waiting for {} strategy ({}/{})", strategy.kind(), i + 1, self.strategies.len());
                strategy
                    .wait_until_ready(target)
                    .await
                    .with_context(|| format!("{} strategy failed", strategy.kind()))?;
            }
            Ok(())
        })
        .await
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::super::fixture::FixedTarget;
    use super::super::{for_file, for_log};
    use super::*;
    use crate::core::error::SdkError;

    #[tokio::test]
    async fn test_children_run_in_order_under_deadline() {
        let mut target = FixedTarget::running();
        target.files.insert("/ready".into(), Vec::new());
        *target.logs.lock() = b"up\n".to_vec();

        for_all(vec![for_file("/ready").into(), for_log("up").into()])
            .wait_until_ready(&target)
            .await
            .unwrap();

        let err = for_all(vec![for_log("up").into(), for_log("never").into()])
            .with_deadline(Duration::from_millis(80))
            .wait_until_ready(&target)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<SdkError>(), Some(SdkError::WaitTimeout(t)) if *t == Duration::from_millis(80)));
    }
}
