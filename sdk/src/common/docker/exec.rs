//! # Docker SDK Exec Engine
//!
//! File: sdk/src/common/docker/exec.rs
//!
//! ## Overview
//!
//! Runs a command inside a running container: create the exec instance, attach to
//! its output, then poll `exec_inspect` every 100 ms until it stops running and
//! report the exit code together with the captured output.
//!
//! Output is returned in the daemon's framed format unless `multiplexed` is set,
//! in which case the frame headers are stripped and stdout and stderr are merged
//! in stream order.
//!
use super::api::DaemonClient;
use super::stdcopy;
use crate::core::error::{Result, SdkError};
use anyhow::{anyhow, Context};
use bollard::exec::CreateExecOptions;
use futures_util::StreamExt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Interval between `exec_inspect` polls.
pub const EXEC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Options for `exec`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOptions {
    pub user: Option<String>,
    pub working_dir: Option<String>,
    /// `KEY=VALUE` entries.
    pub env: Vec<String>,
    pub tty: bool,
    /// Strip frame headers and merge stdout and stderr.
    pub multiplexed: bool,
}

impl ExecOptions {
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{}={}", key, value));
        self
    }

    pub fn tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }

    pub fn multiplexed(mut self) -> Self {
        self.multiplexed = true;
        self
    }
}

/// Outcome of an exec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i64,
    /// Framed output, or merged plain output when `multiplexed` was requested.
    pub output: Vec<u8>,
    pub multiplexed: bool,
}

impl ExecResult {
    /// Output as text with frame headers removed.
    pub fn output_string(&self) -> Result<String> {
        let plain = if self.multiplexed {
            self.output.clone()
        } else {
            stdcopy::merge(&self.output)?
        };
        Ok(String::from_utf8_lossy(&plain).into_owned())
    }

    /// Separate stdout and stderr. Only available for framed output.
    pub fn split(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        if self.multiplexed {
            return Err(anyhow!("exec output was merged, streams can no longer be split"));
        }
        stdcopy::demultiplex(&self.output)
    }
}

/// Runs `cmd` in `container_id` and waits for it to finish.
///
/// # Errors
///
/// Daemon failures (`SdkError::DockerApi`), and frame decoding failures when
/// `multiplexed` is set.
#[instrument(skip(daemon, options), fields(container_id = %container_id))]
pub async fn exec(daemon: &dyn DaemonClient, container_id: &str, cmd: &[String], options: &ExecOptions) -> Result<ExecResult> {
    let create = CreateExecOptions::<String> {
        cmd: Some(cmd.to_vec()),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        tty: Some(options.tty),
        env: (!options.env.is_empty()).then(|| options.env.clone()),
        user: options.user.clone(),
        working_dir: options.working_dir.clone(),
        ..Default::default()
    };

    let exec_id = daemon
        .exec_create(container_id, create)
        .await
        .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
        .with_context(|| format!("Failed to create exec {:?}", cmd))?;

    let mut stream = daemon
        .exec_attach(&exec_id, options.tty)
        .await
        .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
        .context("Failed to attach to exec")?;

    let mut output = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| anyhow!(SdkError::DockerApi { source: e }))?;
        output.extend_from_slice(&chunk);
    }

    let exit_code = loop {
        let inspect = daemon
            .exec_inspect(&exec_id)
            .await
            .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
            .context("Failed to inspect exec")?;
        if !inspect.running.unwrap_or(false) {
            break inspect.exit_code.unwrap_or(-1);
        }
        tokio::time::sleep(EXEC_POLL_INTERVAL).await;
    };
    debug!(exit_code, "Exec {:?} finished", cmd);

    let output = if options.multiplexed {
        stdcopy::merge(&output)?
    } else {
        output
    };
    Ok(ExecResult {
        exit_code,
        output,
        multiplexed: options.multiplexed,
    })
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::docker::stdcopy::{encode_frame, StreamKind};
    use crate::testing::FakeDaemon;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_exec_reports_exit_code_and_framed_output() {
        let fake = FakeDaemon::new();
        let id = fake.add_running_container("alpine");
        let mut framed = encode_frame(StreamKind::Stdout, b"hello\n");
        framed.extend(encode_frame(StreamKind::Stderr, b"warn\n"));
        fake.on_exec("echo", 3, framed);

        let result = exec(&fake, &id, &cmd(&["echo", "hello"]), &ExecOptions::default())
            .await
            .unwrap();
        assert_eq!(result.exit_code, 3);
        let (out, err) = result.split().unwrap();
        assert_eq!(out, b"hello\n");
        assert_eq!(err, b"warn\n");
        assert_eq!(result.output_string().unwrap(), "hello\nwarn\n");
    }

    #[tokio::test]
    async fn test_multiplexed_strips_headers() {
        let fake = FakeDaemon::new();
        let id = fake.add_running_container("alpine");
        fake.on_exec("cat", 0, encode_frame(StreamKind::Stdout, b"data"));

        let options = ExecOptions::default().user("root").env("A", "1").multiplexed();
        let result = exec(&fake, &id, &cmd(&["cat", "/f"]), &options).await.unwrap();
        assert_eq!(result.output, b"data");
        assert!(result.split().is_err());

        let created = fake.last_exec().unwrap();
        assert_eq!(created.user.as_deref(), Some("root"));
        assert_eq!(created.env, Some(vec!["A=1".to_string()]));
    }

    #[tokio::test]
    async fn test_exec_in_missing_container_fails() {
        let fake = FakeDaemon::new();
        assert!(exec(&fake, "nope", &cmd(&["true"]), &ExecOptions::default())
            .await
            .is_err());
    }
}
