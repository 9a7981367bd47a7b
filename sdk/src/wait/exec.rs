//! # Docker SDK Exec Strategy
//!
//! File: sdk/src/wait/exec.rs
//!
//! ## Overview
//!
//! Ready once a command run inside the container exits with an accepted code
//! (`0` unless a matcher is set) and, optionally, its output satisfies a matcher.
//!
use super::{poll, timed, Matcher, Strategy, StrategyTarget, Timing};
use crate::common::docker::exec::ExecOptions;
use crate::core::error::Result;
use async_trait::async_trait;
use tracing::{debug, instrument};

pub fn for_exec<S: AsRef<str>>(cmd: &[S]) -> ExecStrategy {
    ExecStrategy {
        cmd: cmd.iter().map(|s| s.as_ref().to_string()).collect(),
        exit_code: Matcher::new(|code| *code == 0),
        output: None,
        options: ExecOptions::default(),
        timing: Timing::default(),
    }
}

#[derive(Debug, Clone)]
pub struct ExecStrategy {
    pub cmd: Vec<String>,
    exit_code: Matcher<i64>,
    output: Option<Matcher<str>>,
    options: ExecOptions,
    timing: Timing,
}

timed!(ExecStrategy);

impl ExecStrategy {
    pub fn with_exit_code_matcher(mut self, matcher: impl Fn(&i64) -> bool + Send + Sync + 'static) -> Self {
        self.exit_code = Matcher::new(matcher);
        self
    }

    /// Also requires the merged output to satisfy `matcher`.
    pub fn with_output_matcher(mut self, matcher: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.output = Some(Matcher::new(matcher));
        self
    }

    pub fn with_options(mut self, options: ExecOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl Strategy for ExecStrategy {
    #[instrument(skip(self, target), fields(cmd = ?self.cmd))]
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()> {
        poll(target, self.timing, || async {
            let result = target.exec(&self.cmd, &self.options).await?;
            if !self.exit_code.matches(&result.exit_code) {
                debug!(exit_code = result.exit_code, "Exec not ready yet");
                return Ok(false);
            }
            match &self.output {
                Some(matcher) => Ok(matcher.matches(&result.output_string()?)),
                None => Ok(true),
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
    async fn test_exit_code_matcher() {
        let mut target = FixedTarget::running();
        target.exec_exit = 2;

        let strict = for_exec(&["pg_isready"])
            .with_startup_timeout(Duration::from_millis(80))
            .with_poll_interval(Duration::from_millis(10));
        assert!(strict.wait_until_ready(&target).await.is_err());

        let lenient = for_exec(&["pg_isready"]).with_exit_code_matcher(|code| *code == 2);
        lenient.wait_until_ready(&target).await.unwrap();
    }
}
