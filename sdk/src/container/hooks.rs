//! # Docker SDK Lifecycle Hooks
//!
//! File: sdk/src/container/hooks.rs
//!
//! ## Overview
//!
//! Nine ordered hook points surround every container transition:
//!
//! ```text
//! PreCreate -> create -> PostCreate -> PreStart -> start -> PostStart -> PostReady
//! PreStop -> stop -> PostStop
//! PreTerminate -> remove -> PostTerminate
//! ```
//!
//! PreCreate hooks see the mutable `CreateInput` (definition plus the raw create
//! configs); every other hook receives the `Container`.
//!
//! ## Architecture
//!
//! The orchestrator runs with one effective `LifecycleHooks`, produced by
//! `combine` from the built-in defaults and the user's sets:
//!
//! - Pre slots run the defaults first, then the user hooks.
//! - Post slots run the user hooks first, then the defaults.
//!
use super::definition::Definition;
use super::Container;
use crate::common::docker::engine::Engine;
use crate::core::error::{MultiError, Result};
use bollard::container::Config;
use bollard::models::{EndpointSettings, HostConfig};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Everything a PreCreate hook may change before the container is created.
#[derive(Debug, Clone)]
pub struct CreateInput {
    pub definition: Definition,
    pub engine: Engine,
    pub config: Config<String>,
    pub host_config: HostConfig,
    /// Endpoint settings of the network passed at create time, keyed by network name.
    pub endpoints: HashMap<String, EndpointSettings>,
}

pub type DefinitionHook = Arc<dyn for<'a> Fn(&'a mut CreateInput) -> BoxFuture<'a, Result<()>> + Send + Sync>;
pub type ContainerHook = Arc<dyn Fn(Container) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wraps a PreCreate closure. Closures return `Box::pin(async move { .. })`.
pub fn definition_hook<F>(f: F) -> DefinitionHook
where
    F: for<'a> Fn(&'a mut CreateInput) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps an async closure taking the container.
pub fn container_hook<F, Fut>(f: F) -> ContainerHook
where
    F: Fn(Container) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |container| Box::pin(f(container)))
}

/// The nine hook points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookSlot {
    PreCreate,
    PostCreate,
    PreStart,
    PostStart,
    PostReady,
    PreStop,
    PostStop,
    PreTerminate,
    PostTerminate,
}

impl HookSlot {
    pub const ALL: [HookSlot; 9] = [
        HookSlot::PreCreate,
        HookSlot::PostCreate,
        HookSlot::PreStart,
        HookSlot::PostStart,
        HookSlot::PostReady,
        HookSlot::PreStop,
        HookSlot::PostStop,
        HookSlot::PreTerminate,
        HookSlot::PostTerminate,
    ];

    pub fn is_pre(self) -> bool {
        matches!(
            self,
            HookSlot::PreCreate | HookSlot::PreStart | HookSlot::PreStop | HookSlot::PreTerminate
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            HookSlot::PreCreate => "pre-create",
            HookSlot::PostCreate => "post-create",
            HookSlot::PreStart => "pre-start",
            HookSlot::PostStart => "post-start",
            HookSlot::PostReady => "post-ready",
            HookSlot::PreStop => "pre-stop",
            HookSlot::PostStop => "post-stop",
            HookSlot::PreTerminate => "pre-terminate",
            HookSlot::PostTerminate => "post-terminate",
        }
    }
}

/// One set of hooks; each slot runs its hooks in order.
#[derive(Clone, Default)]
pub struct LifecycleHooks {
    pub pre_creates: Vec<DefinitionHook>,
    pub post_creates: Vec<ContainerHook>,
    pub pre_starts: Vec<ContainerHook>,
    pub post_starts: Vec<ContainerHook>,
    pub post_readies: Vec<ContainerHook>,
    pub pre_stops: Vec<ContainerHook>,
    pub post_stops: Vec<ContainerHook>,
    pub pre_terminates: Vec<ContainerHook>,
    pub post_terminates: Vec<ContainerHook>,
}

impl fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("LifecycleHooks");
        s.field("pre_creates", &self.pre_creates.len());
        for slot in &HookSlot::ALL[1..] {
            s.field(slot.name(), &self.container_hooks(*slot).len());
        }
        s.finish()
    }
}

impl LifecycleHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_create<F>(mut self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut CreateInput) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.pre_creates.push(Arc::new(f));
        self
    }

    /// Appends `hook` to a container slot. `PreCreate` is ignored; use `pre_create`.
    pub fn on<F, Fut>(mut self, slot: HookSlot, f: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if let Some(hooks) = self.container_hooks_mut(slot) {
            hooks.push(container_hook(f));
        }
        self
    }

    pub fn post_create<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(HookSlot::PostCreate, f)
    }

    pub fn pre_start<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(HookSlot::PreStart, f)
    }

    pub fn post_start<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(HookSlot::PostStart, f)
    }

    pub fn post_ready<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(HookSlot::PostReady, f)
    }

    pub fn pre_stop<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(HookSlot::PreStop, f)
    }

    pub fn post_stop<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(HookSlot::PostStop, f)
    }

    pub fn pre_terminate<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(HookSlot::PreTerminate, f)
    }

    pub fn post_terminate<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Container) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on(HookSlot::PostTerminate, f)
    }

    /// Hooks of a container slot; empty for `PreCreate`.
    pub fn container_hooks(&self, slot: HookSlot) -> &[ContainerHook] {
        match slot {
            HookSlot::PreCreate => &[],
            HookSlot::PostCreate => &self.post_creates,
            HookSlot::PreStart => &self.pre_starts,
            HookSlot::PostStart => &self.post_starts,
            HookSlot::PostReady => &self.post_readies,
            HookSlot::PreStop => &self.pre_stops,
            HookSlot::PostStop => &self.post_stops,
            HookSlot::PreTerminate => &self.pre_terminates,
            HookSlot::PostTerminate => &self.post_terminates,
        }
    }

    fn container_hooks_mut(&mut self, slot: HookSlot) -> Option<&mut Vec<ContainerHook>> {
        match slot {
            HookSlot::PreCreate => None,
            HookSlot::PostCreate => Some(&mut self.post_creates),
            HookSlot::PreStart => Some(&mut self.pre_starts),
            HookSlot::PostStart => Some(&mut self.post_starts),
            HookSlot::PostReady => Some(&mut self.post_readies),
            HookSlot::PreStop => Some(&mut self.pre_stops),
            HookSlot::PostStop => Some(&mut self.post_stops),
            HookSlot::PreTerminate => Some(&mut self.pre_terminates),
            HookSlot::PostTerminate => Some(&mut self.post_terminates),
        }
    }

    pub fn len(&self) -> usize {
        self.pre_creates.len()
            + HookSlot::ALL
                .iter()
                .map(|slot| self.container_hooks(*slot).len())
                .sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs the PreCreate hooks in order, stopping at the first failure.
    pub(crate) async fn run_pre_create(&self, input: &mut CreateInput) -> Result<()> {
        for hook in &self.pre_creates {
            hook(&mut *input).await?;
        }
        Ok(())
    }

    /// Runs the hooks of `slot` in order, stopping at the first failure.
    pub(crate) async fn run(&self, slot: HookSlot, container: &Container) -> Result<()> {
        for hook in self.container_hooks(slot) {
            hook(container.clone()).await?;
        }
        Ok(())
    }

    /// Runs every hook of `slot` and joins the failures.
    pub(crate) async fn run_all(&self, slot: HookSlot, container: &Container) -> Result<()> {
        let mut errors = MultiError::new();
        for hook in self.container_hooks(slot) {
            if let Err(e) = hook(container.clone()).await {
                errors.push(e.context(format!("{} hook failed", slot.name())));
            }
        }
        errors.into_result()
    }
}

fn combine_pre<T: Clone>(defaults: &[LifecycleHooks], user: &[LifecycleHooks], pick: impl Fn(&LifecycleHooks) -> &[T]) -> Vec<T> {
    defaults.iter().chain(user).flat_map(|h| pick(h).iter().cloned()).collect()
}

fn combine_post<T: Clone>(defaults: &[LifecycleHooks], user: &[LifecycleHooks], pick: impl Fn(&LifecycleHooks) -> &[T]) -> Vec<T> {
    user.iter().chain(defaults).flat_map(|h| pick(h).iter().cloned()).collect()
}

/// Merges default and user hook sets into the one set the orchestrator runs.
pub fn combine(defaults: &[LifecycleHooks], user: &[LifecycleHooks]) -> LifecycleHooks {
    LifecycleHooks {
        pre_creates: combine_pre(defaults, user, |h| h.pre_creates.as_slice()),
        post_creates: combine_post(defaults, user, |h| h.post_creates.as_slice()),
        pre_starts: combine_pre(defaults, user, |h| h.pre_starts.as_slice()),
        post_starts: combine_post(defaults, user, |h| h.post_starts.as_slice()),
        post_readies: combine_post(defaults, user, |h| h.post_readies.as_slice()),
        pre_stops: combine_pre(defaults, user, |h| h.pre_stops.as_slice()),
        post_stops: combine_post(defaults, user, |h| h.post_stops.as_slice()),
        pre_terminates: combine_pre(defaults, user, |h| h.pre_terminates.as_slice()),
        post_terminates: combine_post(defaults, user, |h| h.post_terminates.as_slice()),
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::ClientConfig;
    use crate::testing::FakeDaemon;
    use parking_lot::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording_set(log: &Log, prefix: &str) -> LifecycleHooks {
        let mut hooks = LifecycleHooks::new();
        for i in 0..2 {
            let label = format!("{prefix}{i}");
            let log_pre = Arc::clone(log);
            let pre_label = label.clone();
            hooks = hooks.pre_create(move |_input| {
                let log = Arc::clone(&log_pre);
                let label = pre_label.clone();
                Box::pin(async move {
                    log.lock().push(format!("pre-create {label}"));
                    Ok(())
                })
            });
            for slot in &HookSlot::ALL[1..] {
                let log = Arc::clone(log);
                let entry = format!("{} {label}", slot.name());
                hooks = hooks.on(*slot, move |_c| {
                    let log = Arc::clone(&log);
                    let entry = entry.clone();
                    async move {
                        log.lock().push(entry);
                        Ok(())
                    }
                });
            }
        }
        hooks
    }

    #[tokio::test]
    async fn test_combined_order_defaults_bracket_user_hooks() {
        let log: Log = Arc::default();
        let defaults: Vec<_> = (0..2).map(|i| recording_set(&log, &format!("d{i}."))).collect();
        let user: Vec<_> = (0..3).map(|i| recording_set(&log, &format!("u{i}."))).collect();
        let combined = combine(&defaults, &user);

        let engine = Engine::new(Arc::new(FakeDaemon::new()), ClientConfig::default());
        let container = Container::detached(engine, "0123456789abcdef", "alpine");
        let mut input = CreateInput {
            definition: Definition::new("alpine"),
            engine: container.engine().clone(),
            config: Config::default(),
            host_config: HostConfig::default(),
            endpoints: HashMap::new(),
        };
        combined.run_pre_create(&mut input).await.unwrap();
        for slot in &HookSlot::ALL[1..] {
            combined.run(*slot, &container).await.unwrap();
        }

        let log = log.lock().clone();
        assert_eq!(log.len(), 90);

        let pre_expected = ["d0.0", "d0.1", "d1.0", "d1.1", "u0.0", "u0.1", "u1.0", "u1.1", "u2.0", "u2.1"];
        let post_expected = ["u0.0", "u0.1", "u1.0", "u1.1", "u2.0", "u2.1", "d0.0", "d0.1", "d1.0", "d1.1"];
        for (index, slot) in HookSlot::ALL.iter().enumerate() {
            let expected = if slot.is_pre() { &pre_expected } else { &post_expected };
            let actual: Vec<String> = log[index * 10..(index + 1) * 10].to_vec();
            let wanted: Vec<String> = expected.iter().map(|l| format!("{} {}", slot.name(), l)).collect();
            assert_eq!(actual, wanted, "slot {}", slot.name());
        }
    }

    #[tokio::test]
    async fn test_run_all_joins_failures() {
        let hooks = LifecycleHooks::new()
            .pre_stop(|_| async { Err(anyhow::anyhow!("first")) })
            .pre_stop(|_| async { Err(anyhow::anyhow!("second")) });
        let engine = Engine::new(Arc::new(FakeDaemon::new()), ClientConfig::default());
        let container = Container::detached(engine, "0123456789abcdef", "alpine");

        let err = hooks.run_all(HookSlot::PreStop, &container).await.unwrap_err();
        let joined = err.downcast_ref::<MultiError>().unwrap();
        assert_eq!(joined.len(), 2);
        assert!(hooks.run(HookSlot::PreStop, &container).await.unwrap_err().to_string().contains("first"));
    }
}
