//! # Docker SDK Readiness Engine (`wait`)
//!
//! File: sdk/src/wait/mod.rs
//!
//! ## Overview
//!
//! Wait strategies decide when a started container is ready to be used. Each
//! strategy polls a predicate against a `StrategyTarget` (normally a `Container`)
//! until it holds, its startup timeout elapses, or the container reaches a fatal
//! state.
//!
//! ## Architecture
//!
//! - **`WaitStrategy`**: A tagged variant over every concrete strategy. `All`
//!   composes a sequence of children under one aggregate deadline.
//! - **`Strategy`**: The single operation, `wait_until_ready`, implemented by each
//!   concrete strategy and by `WaitStrategy` itself.
//! - **`StrategyTarget`**: The capabilities a strategy may use (host, inspect,
//!   mapped ports, logs, exec, state, copy-out).
//! - **`walk`**: Depth-first traversal with in-place removal (see `walk.rs`).
//!
//! ## Fatal States
//!
//! Between probes the target's state is sampled:
//! - OOM killed: `SdkError::ContainerOomKilled`
//! - status `exited`: `SdkError::ContainerExited(code)`
//! - not running with any other status: `SdkError::ContainerUnexpectedStatus`
//!
//! ## Examples
//!
//! ```rust
//! use docker_sdk::wait::{self, WaitStrategy};
//! use std::time::Duration;
//!
//! let strategy: WaitStrategy = wait::for_all(vec![
//!     wait::for_listening_port("5432/tcp").into(),
//!     wait::for_log("database system is ready to accept connections")
//!         .with_occurrence(2)
//!         .into(),
//! ])
//! .with_deadline(Duration::from_secs(90))
//! .into();
//! assert!(matches!(strategy, WaitStrategy::All(_)));
//! ```
//!
mod all;
mod exec;
mod exit;
mod file;
mod health;
mod http;
mod log;
mod port;
mod tls;
mod walk;

pub use all::{for_all, AllStrategy};
pub use exec::{for_exec, ExecStrategy};
pub use exit::{for_exit, ExitStrategy};
pub use file::{for_file, FileStrategy};
pub use health::{for_health, HealthStrategy};
pub use http::{for_http, HttpStrategy};
pub use log::{for_log, for_log_regex, LogStrategy};
pub use port::{
    for_exposed_port, for_listening_port, for_mapped_port, ExposedPortStrategy, ListeningPortStrategy,
    MappedPortStrategy,
};
pub use tls::{for_tls_cert, TlsCertStrategy, TlsMaterial};
pub use walk::{walk, VisitAction};

use crate::common::docker::exec::{ExecOptions, ExecResult};
use crate::core::error::{Result, SdkError};
use anyhow::anyhow;
use async_trait::async_trait;
use bollard::models::{ContainerInspectResponse, ContainerState, ContainerStateStatusEnum};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Default time a strategy may take before failing with `WaitTimeout`.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(60);
/// Default pause between probe attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a strategy can observe and do with the container it waits on.
#[async_trait]
pub trait StrategyTarget: Send + Sync {
    /// Host name or address the container's mapped ports are reachable on.
    async fn host(&self) -> Result<String>;
    async fn inspect(&self) -> Result<ContainerInspectResponse>;
    /// Host port mapped to `port` (`80` or `80/tcp`).
    ///
    /// Fails with `SdkError::PortNotFound` while the port is not mapped.
    async fn mapped_port(&self, port: &str) -> Result<u16>;
    /// Full log history, stdout and stderr merged.
    async fn logs(&self) -> Result<Vec<u8>>;
    async fn exec(&self, cmd: &[String], options: &ExecOptions) -> Result<ExecResult>;
    async fn state(&self) -> Result<ContainerState>;
    /// Contents of the file at `path` inside the container.
    async fn copy_from(&self, path: &str) -> Result<Vec<u8>>;
}

/// A readiness probe.
#[async_trait]
pub trait Strategy: Send + Sync {
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()>;
}

/// Every strategy the SDK ships.
#[derive(Debug, Clone)]
pub enum WaitStrategy {
    ListeningPort(ListeningPortStrategy),
    MappedPort(MappedPortStrategy),
    ExposedPort(ExposedPortStrategy),
    Exec(ExecStrategy),
    File(FileStrategy),
    Log(LogStrategy),
    Http(HttpStrategy),
    Exit(ExitStrategy),
    TlsCert(TlsCertStrategy),
    Health(HealthStrategy),
    All(AllStrategy),
}

impl WaitStrategy {
    /// Variant name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ListeningPort(_) => "listening-port",
            Self::MappedPort(_) => "mapped-port",
            Self::ExposedPort(_) => "exposed-port",
            Self::Exec(_) => "exec",
            Self::File(_) => "file",
            Self::Log(_) => "log",
            Self::Http(_) => "http",
            Self::Exit(_) => "exit",
            Self::TlsCert(_) => "tls-cert",
            Self::Health(_) => "health",
            Self::All(_) => "all",
        }
    }
}

#[async_trait]
impl Strategy for WaitStrategy {
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()> {
        match self {
            Self::ListeningPort(s) => s.wait_until_ready(target).await,
            Self::MappedPort(s) => s.wait_until_ready(target).await,
            Self::ExposedPort(s) => s.wait_until_ready(target).await,
            Self::Exec(s) => s.wait_until_ready(target).await,
            Self::File(s) => s.wait_until_ready(target).await,
            Self::Log(s) => s.wait_until_ready(target).await,
            Self::Http(s) => s.wait_until_ready(target).await,
            Self::Exit(s) => s.wait_until_ready(target).await,
            Self::TlsCert(s) => s.wait_until_ready(target).await,
            Self::Health(s) => s.wait_until_ready(target).await,
            Self::All(s) => s.wait_until_ready(target).await,
        }
    }
}

macro_rules! into_wait_strategy {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for WaitStrategy {
                fn from(strategy: $ty) -> Self {
                    WaitStrategy::$variant(strategy)
                }
            }
        )*
    };
}

into_wait_strategy! {
    ListeningPort => ListeningPortStrategy,
    MappedPort => MappedPortStrategy,
    ExposedPort => ExposedPortStrategy,
    Exec => ExecStrategy,
    File => FileStrategy,
    Log => LogStrategy,
    Http => HttpStrategy,
    Exit => ExitStrategy,
    TlsCert => TlsCertStrategy,
    Health => HealthStrategy,
    All => AllStrategy,
}

/// Startup timeout and poll interval carried by every polling strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Adds `with_startup_timeout` / `with_poll_interval` to a strategy with a
/// `timing` field.
macro_rules! timed {
    ($ty:ty) => {
        impl $ty {
            pub fn with_startup_timeout(mut self, timeout: std::time::Duration) -> Self {
                self.timing.startup_timeout = timeout;
                self
            }

            pub fn with_poll_interval(mut self, interval: std::time::Duration) -> Self {
                self.timing.poll_interval = interval;
                self
            }

            pub fn timing(&self) -> $crate::wait::Timing {
                self.timing
            }
        }
    };
}
pub(crate) use timed;

/// A shareable predicate.
pub struct Matcher<T: ?Sized>(Arc<dyn Fn(&T) -> bool + Send + Sync>);

impl<T: ?Sized> Matcher<T> {
    pub fn new(f: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn matches(&self, value: &T) -> bool {
        (self.0)(value)
    }
}

impl<T: ?Sized> Clone for Matcher<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> fmt::Debug for Matcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Matcher(..)")
    }
}

/// Maps a daemon-reported state to the matching fatal error, if any.
pub fn check_fatal_state(state: &ContainerState) -> Result<()> {
    if state.oom_killed.unwrap_or(false) {
        return Err(anyhow!(SdkError::ContainerOomKilled));
    }
    let status = state.status.clone().unwrap_or(ContainerStateStatusEnum::EMPTY);
    if status == ContainerStateStatusEnum::EXITED {
        return Err(anyhow!(SdkError::ContainerExited(state.exit_code.unwrap_or(0))));
    }
    if !state.running.unwrap_or(false) && status != ContainerStateStatusEnum::RUNNING {
        return Err(anyhow!(SdkError::ContainerUnexpectedStatus(status.to_string())));
    }
    Ok(())
}

/// Samples the target's state and fails on a fatal one.
pub(crate) async fn ensure_alive(target: &dyn StrategyTarget) -> Result<()> {
    let state = target.state().await?;
    check_fatal_state(&state)
}

/// Runs `fut` under `timeout`, mapping expiry to `SdkError::WaitTimeout`.
pub(crate) async fn within<T>(timeout: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(SdkError::WaitTimeout(timeout))),
    }
}

/// Polls `probe` until it reports ready, checking for fatal states before each
/// attempt. Errors returned by `probe` end the wait.
pub(crate) async fn poll<F, Fut>(target: &dyn StrategyTarget, timing: Timing, probe: F) -> Result<()>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool>> + Send,
{
    within(timing.startup_timeout, poll_untimed(target, timing.poll_interval, probe)).await
}

/// The `poll` loop without a deadline, for strategies that already run inside
/// their own `within`.
pub(crate) async fn poll_untimed<F, Fut>(target: &dyn StrategyTarget, interval: Duration, mut probe: F) -> Result<()>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<bool>> + Send,
{
    loop {
        ensure_alive(target).await?;
        if probe().await? {
            return Ok(());
        }
        tokio::time::sleep(interval).await;
    }
}

/// Waits until `port` is mapped, returning the host port.
pub(crate) async fn wait_for_mapping(target: &dyn StrategyTarget, port: &str, interval: Duration) -> Result<u16> {
    loop {
        ensure_alive(target).await?;
        match target.mapped_port(port).await {
            Ok(host_port) if host_port != 0 => return Ok(host_port),
            Ok(_) => {}
            Err(e) if matches!(e.downcast_ref::<SdkError>(), Some(SdkError::PortNotFound { .. })) => {}
            Err(e) => return Err(e),
        }
        tokio::time::sleep(interval).await;
    }
}

/// Test target backed by a fixed state and a few scripted answers.
#[cfg(test)]
pub(crate) mod fixture {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FixedTarget {
        pub state: Mutex<ContainerState>,
        pub ports: HashMap<String, u16>,
        /// How long `mapped_port` takes to answer.
        pub mapping_delay: Duration,
        pub logs: Mutex<Vec<u8>>,
        pub files: HashMap<String, Vec<u8>>,
        pub exec_exit: i64,
        pub exec_calls: Mutex<usize>,
    }

    impl FixedTarget {
        pub fn running() -> Self {
            Self {
                state: Mutex::new(ContainerState {
                    status: Some(ContainerStateStatusEnum::RUNNING),
                    running: Some(true),
                    ..Default::default()
                }),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl StrategyTarget for FixedTarget {
        async fn host(&self) -> Result<String> {
            Ok("127.0.0.1".to_string())
        }

        async fn inspect(&self) -> Result<ContainerInspectResponse> {
            Ok(ContainerInspectResponse::default())
        }

        async fn mapped_port(&self, port: &str) -> Result<u16> {
            if !self.mapping_delay.is_zero() {
                tokio::time::sleep(self.mapping_delay).await;
            }
            let key = crate::container::ports::normalize_port(port);
            self.ports
                .get(&key)
                .copied()
                .ok_or_else(|| anyhow!(SdkError::PortNotFound { port: key }))
        }

        async fn logs(&self) -> Result<Vec<u8>> {
            Ok(self.logs.lock().clone())
        }

        async fn exec(&self, _cmd: &[String], _options: &ExecOptions) -> Result<ExecResult> {
            *self.exec_calls.lock() += 1;
            Ok(ExecResult {
                exit_code: self.exec_exit,
                ..Default::default()
            })
        }

        async fn state(&self) -> Result<ContainerState> {
            Ok(self.state.lock().clone())
        }

        async fn copy_from(&self, path: &str) -> Result<Vec<u8>> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow!("Could not find the file {}", path))
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn state(status: ContainerStateStatusEnum, running: bool) -> ContainerState {
        ContainerState {
            status: Some(status),
            running: Some(running),
            ..Default::default()
        }
    }

    #[test]
    fn test_fatal_state_classification() {
        assert!(check_fatal_state(&state(ContainerStateStatusEnum::RUNNING, true)).is_ok());

        let mut oom = state(ContainerStateStatusEnum::RUNNING, true);
        oom.oom_killed = Some(true);
        let err = check_fatal_state(&oom).unwrap_err();
        assert_eq!(err.to_string(), "container crashed with out-of-memory (OOMKilled)");

        let mut exited = state(ContainerStateStatusEnum::EXITED, false);
        exited.exit_code = Some(137);
        let err = check_fatal_state(&exited).unwrap_err();
        assert_eq!(err.to_string(), "container exited with code 137");

        let err = check_fatal_state(&state(ContainerStateStatusEnum::DEAD, false)).unwrap_err();
        assert_eq!(err.to_string(), "unexpected container status \"dead\"");
    }

    #[test]
    fn test_matcher_is_shared_between_clones() {
        let even = Matcher::<u16>::new(|n| n % 2 == 0);
        let copy = even.clone();
        assert!(copy.matches(&4));
        assert!(!even.matches(&3));
        assert_eq!(format!("{:?}", even), "Matcher(..)");
    }

    #[tokio::test]
    async fn test_poll_times_out() {
        let target = fixture::FixedTarget::running();
        let timing = Timing {
            startup_timeout: Duration::from_millis(50),
            poll_interval: Duration::from_millis(10),
        };
        let err = poll(&target, timing, || async { Ok(false) }).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<SdkError>(), Some(SdkError::WaitTimeout(_))));
    }
}
