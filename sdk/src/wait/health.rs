//! # Docker SDK Health Strategy
//!
//! File: sdk/src/wait/health.rs
//!
//! ## Overview
//!
//! Ready once the daemon reports the container's health check as `healthy`.
//!
use super::{poll, timed, Strategy, StrategyTarget, Timing};
use crate::core::error::Result;
use async_trait::async_trait;
use bollard::models::HealthStatusEnum;
use tracing::instrument;

pub fn for_health() -> HealthStrategy {
    HealthStrategy {
        timing: Timing::default(),
    }
}

#[derive(Debug, Clone)]
pub struct HealthStrategy {
    timing: Timing,
}

timed!(HealthStrategy);

#[async_trait]
impl Strategy for HealthStrategy {
    #[instrument(skip(self, target))]
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()> {
        poll(target, self.timing, || async {
            let state = target.state().await?;
            Ok(state.health.and_then(|h| h.status) == Some(HealthStatusEnum::HEALTHY))
        })
        .await
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::super::fixture::FixedTarget;
    use super::*;
    use bollard::models::Health;

    #[tokio::test]
    async fn test_healthy_status() {
        let target = FixedTarget::running();
        target.state.lock().health = Some(Health {
            status: Some(HealthStatusEnum::HEALTHY),
            ..Default::default()
        });
        for_health().wait_until_ready(&target).await.unwrap();
    }
}
