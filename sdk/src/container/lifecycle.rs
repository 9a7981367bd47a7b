//! # Docker SDK Container Lifecycle
//!
//! File: sdk/src/container/lifecycle.rs
//!
//! ## Overview
//!
//! `run` and `create` turn a `Definition` into a daemon container; `Container`
//! drives the rest of its life (`start`, `stop`, `terminate`). Every transition
//! runs the combined lifecycle hooks around the daemon call.
//!
//! ## Architecture
//!
//! 1. **Validate** the definition and resolve the engine.
//! 2. **Build** the image when the definition comes from a Dockerfile.
//! 3. **Reuse** an existing container by name when requested.
//! 4. **PreCreate** hooks adjust the create configs (ports, modifiers, pull).
//! 5. **Create** with the first network, then connect the remaining ones.
//! 6. **PostCreate** hooks (file copies), then `start` unless disabled.
//!
//! A failure after the container exists hands the container back inside
//! `RunError` so the caller can still terminate it.
//!
use super::defaults::default_hooks;
use super::definition::{Definition, FromDockerfile};
use super::hooks::{combine, CreateInput, HookSlot, LifecycleHooks};
use super::logs::LogProducer;
use crate::common::docker::api::CreateRequest;
use crate::common::docker::engine::Engine;
use crate::common::docker::images::{build_image, remove_image, BuildOptions};
use crate::common::docker::labels::{merge_labels, ResourceKind};
use crate::core::env::DockerEnv;
use crate::core::error::{is_cleanup_safe, MultiError, Result, SdkError};
use anyhow::{anyhow, Context};
use bollard::container::{Config, NetworkingConfig};
use bollard::models::{EndpointSettings, HostConfig};
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Seconds the daemon waits before killing a stopping container.
pub const DEFAULT_STOP_TIMEOUT_SECS: i64 = 10;
/// Bound on log retrieval after a failed start.
pub const FAILURE_LOG_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct Inner {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) image: String,
    pub(crate) engine: Engine,
    pub(crate) hooks: LifecycleHooks,
    pub(crate) is_running: AtomicBool,
    pub(crate) log_producer: Mutex<Option<LogProducer>>,
    /// Image built from a Dockerfile, removed on terminate unless kept.
    pub(crate) built_image: Option<String>,
    pub(crate) keep_image: bool,
}

/// A created container. Clones share state.
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<Inner>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("image", &self.inner.image)
            .field("is_running", &self.is_running())
            .finish()
    }
}

/// Options for `Container::terminate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminateOptions {
    /// Seconds to wait for the stop; `DEFAULT_STOP_TIMEOUT_SECS` when unset.
    pub stop_timeout: Option<i64>,
    /// Named volumes removed after the container.
    pub volumes: Vec<String>,
}

impl TerminateOptions {
    pub fn with_stop_timeout(mut self, seconds: i64) -> Self {
        self.stop_timeout = Some(seconds);
        self
    }

    pub fn with_volume(mut self, name: &str) -> Self {
        self.volumes.push(name.to_string());
        self
    }
}

/// Failure of `run` / `create`. Carries the container when it was created.
#[derive(Debug)]
pub struct RunError {
    pub container: Option<Container>,
    pub source: anyhow::Error,
}

impl RunError {
    fn before_create(source: anyhow::Error) -> Self {
        Self {
            container: None,
            source,
        }
    }

    fn after_create(container: Container, source: anyhow::Error) -> Self {
        Self {
            container: Some(container),
            source,
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.source)
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

struct Parts {
    id: String,
    name: String,
    image: String,
    engine: Engine,
    hooks: LifecycleHooks,
    running: bool,
    built_image: Option<String>,
    keep_image: bool,
}

impl Container {
    fn from_parts(parts: Parts) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: parts.id,
                name: parts.name,
                image: parts.image,
                engine: parts.engine,
                hooks: parts.hooks,
                is_running: AtomicBool::new(parts.running),
                log_producer: Mutex::new(None),
                built_image: parts.built_image,
                keep_image: parts.keep_image,
            }),
        }
    }

    /// A handle without hooks or daemon round trip.
    pub(crate) fn detached(engine: Engine, id: &str, image: &str) -> Self {
        Self::from_parts(Parts {
            id: id.to_string(),
            name: String::new(),
            image: image.to_string(),
            engine,
            hooks: LifecycleHooks::default(),
            running: false,
            built_image: None,
            keep_image: true,
        })
    }

    /// Handle for an existing container, looked up by id or name. Only the
    /// default hooks apply.
    #[instrument(skip(engine))]
    pub async fn attach(engine: Engine, id_or_name: &str) -> Result<Self> {
        let inspect = engine
            .daemon()
            .container_inspect(id_or_name)
            .await
            .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
            .with_context(|| format!("Failed to inspect container '{}'", id_or_name))?;
        let id = inspect.id.clone().ok_or_else(|| {
            anyhow!(SdkError::ContainerNotFound {
                id: id_or_name.to_string()
            })
        })?;
        let image = inspect
            .config
            .as_ref()
            .and_then(|c| c.image.clone())
            .unwrap_or_default();
        let definition = Definition::new(image.clone());
        Ok(Self::from_parts(Parts {
            id,
            name: inspect.name.as_deref().unwrap_or_default().trim_start_matches('/').to_string(),
            image,
            engine,
            hooks: combine(&default_hooks(&definition), &[]),
            running: inspect.state.and_then(|s| s.running).unwrap_or(false),
            built_image: None,
            keep_image: true,
        }))
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.inner.is_running.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.inner.is_running.load(Ordering::SeqCst)
    }

    fn hooks(&self) -> &LifecycleHooks {
        &self.inner.hooks
    }

    /// Starts the container and waits for it to become ready.
    ///
    /// On failure the container logs are emitted at error level.
    #[instrument(skip(self), fields(container_id = %self.short_id()))]
    pub async fn start(&self) -> Result<()> {
        let result = self.start_and_wait().await;
        if let Err(e) = &result {
            self.log_failure(e).await;
        }
        result
    }

    async fn start_and_wait(&self) -> Result<()> {
        self.hooks().run(HookSlot::PreStart, self).await?;
        self.engine()
            .daemon()
            .container_start(self.id())
            .await
            .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
            .with_context(|| format!("Failed to start container {}", self.short_id()))?;
        self.hooks().run(HookSlot::PostStart, self).await?;
        self.set_running(true);
        self.hooks().run(HookSlot::PostReady, self).await
    }

    async fn log_failure(&self, err: &anyhow::Error) {
        match tokio::time::timeout(FAILURE_LOG_TIMEOUT, self.logs()).await {
            Ok(Ok(logs)) => error!(
                container_id = %self.short_id(),
                error = %format!("{:#}", err),
                "Container failed to start, logs:\n{}",
                String::from_utf8_lossy(&logs)
            ),
            Ok(Err(e)) => error!(container_id = %self.short_id(), "Failed to fetch logs of failed container: {:#}", e),
            Err(_) => error!(container_id = %self.short_id(), "Timed out fetching logs of failed container"),
        }
    }

    /// Stops the container. `timeout` is in seconds; negative waits forever.
    ///
    /// Hook failures are joined with the daemon error. The daemon client stays
    /// open, so the container can be started again.
    #[instrument(skip(self), fields(container_id = %self.short_id()))]
    pub async fn stop(&self, timeout: Option<i64>) -> Result<()> {
        let timeout = timeout.unwrap_or(DEFAULT_STOP_TIMEOUT_SECS);
        let mut errors = MultiError::new();
        if let Err(e) = self.hooks().run_all(HookSlot::PreStop, self).await {
            errors.push(e);
        }
        match self.engine().daemon().container_stop(self.id(), Some(timeout)).await {
            Ok(()) => info!("Stopped container {}", self.short_id()),
            Err(e) => errors.push(
                anyhow!(SdkError::DockerApi { source: e }).context(format!("Failed to stop container {}", self.short_id())),
            ),
        }
        self.set_running(false);
        if let Err(e) = self.hooks().run_all(HookSlot::PostStop, self).await {
            errors.push(e);
        }
        errors.into_result()
    }

    /// Stops (when running) and removes the container with its anonymous
    /// volumes, then removes a built image, the named `volumes`, and closes an
    /// owned daemon client.
    ///
    /// Every step runs even if an earlier one failed; the failures are joined.
    #[instrument(skip(self, options), fields(container_id = %self.short_id()))]
    pub async fn terminate(&self, options: TerminateOptions) -> Result<()> {
        let mut errors = MultiError::new();

        if self.is_running() {
            if let Err(e) = self.stop(options.stop_timeout).await {
                if is_cleanup_safe(&e) {
                    debug!("Container already gone while stopping: {:#}", e);
                } else {
                    errors.push(e);
                }
            }
        }
        if let Err(e) = self.hooks().run_all(HookSlot::PreTerminate, self).await {
            errors.push(e);
        }

        match self.engine().daemon().container_remove(self.id(), true, true).await {
            Ok(()) => info!("Removed container {}", self.short_id()),
            Err(e) => errors.push(
                anyhow!(SdkError::DockerApi { source: e })
                    .context(format!("Failed to remove container {}", self.short_id())),
            ),
        }
        self.set_running(false);

        if let Err(e) = self.hooks().run_all(HookSlot::PostTerminate, self).await {
            errors.push(e);
        }

        if let (Some(image), false) = (&self.inner.built_image, self.inner.keep_image) {
            if let Err(e) = remove_image(self.engine(), image, true).await {
                errors.push(e);
            }
        }

        for volume in &options.volumes {
            match self.engine().daemon().volume_remove(volume, true).await {
                Ok(()) => debug!("Removed volume {}", volume),
                Err(e) => errors.push(
                    anyhow!(SdkError::DockerApi { source: e }).context(format!("Failed to remove volume '{}'", volume)),
                ),
            }
        }

        self.engine().close_if_owned().await;
        errors.into_result()
    }
}

/// Creates and starts a container.
///
/// # Errors
///
/// `RunError::container` is `None` when the failure happened before the
/// container existed (validation, build, PreCreate hooks, the create call) and
/// `Some` afterwards.
pub async fn run(definition: Definition) -> std::result::Result<Container, RunError> {
    let started = definition.started;
    let container = create_container(definition).await?;
    if started && !container.is_running() {
        if let Err(e) = container.start().await {
            return Err(RunError::after_create(container, e));
        }
    }
    Ok(container)
}

/// Creates a container without starting it.
pub async fn create(definition: Definition) -> std::result::Result<Container, RunError> {
    create_container(definition).await
}

fn random_tag() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("sdk-build-{}:latest", suffix.to_lowercase())
}

async fn build_from_dockerfile(engine: &Engine, build: &FromDockerfile, platform: &str) -> Result<String> {
    let tag = if build.tag.is_empty() { random_tag() } else { build.tag.clone() };
    let mut options = BuildOptions::new(&build.context, tag);
    if !build.dockerfile.is_empty() {
        options.dockerfile = build.dockerfile.clone();
    }
    options.build_args = build.build_args.clone();
    options.platform = platform.to_string();
    build_image(engine, &options).await
}

async fn find_reusable(engine: &Engine, definition: &Definition, hooks: &LifecycleHooks) -> Result<Option<Container>> {
    match engine.daemon().container_inspect(&definition.name).await {
        Ok(inspect) => {
            let Some(id) = inspect.id.clone() else {
                return Ok(None);
            };
            info!(container_id = %id, "Reusing container '{}'", definition.name);
            Ok(Some(Container::from_parts(Parts {
                id,
                name: definition.name.clone(),
                image: definition.image.clone(),
                engine: engine.clone(),
                hooks: hooks.clone(),
                running: inspect.state.and_then(|s| s.running).unwrap_or(false),
                built_image: None,
                keep_image: true,
            })))
        }
        Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => Ok(None),
        Err(e) => Err(anyhow!(SdkError::DockerApi { source: e }))
            .with_context(|| format!("Failed to look up container '{}'", definition.name)),
    }
}

fn initial_configs(definition: &Definition) -> (Config<String>, HostConfig) {
    let config = Config {
        image: Some(definition.image.clone()),
        entrypoint: (!definition.entrypoint.is_empty()).then(|| definition.entrypoint.clone()),
        cmd: (!definition.cmd.is_empty()).then(|| definition.cmd.clone()),
        env: (!definition.env.is_empty()).then(|| definition.env_list()),
        labels: Some(merge_labels(ResourceKind::Container, &definition.labels)),
        ..Default::default()
    };
    let host_config = HostConfig {
        binds: (!definition.binds.is_empty()).then(|| definition.binds.clone()),
        ..Default::default()
    };
    (config, host_config)
}

/// Connects the container to every network after the first.
async fn connect_additional_networks(container: &Container, definition: &Definition) -> Result<()> {
    let daemon = container.engine().daemon();
    for name in definition.networks.iter().skip(1) {
        let network = daemon
            .network_inspect(name, true)
            .await
            .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
            .with_context(|| format!("Failed to inspect network '{}'", name))?;
        let endpoint = EndpointSettings {
            aliases: definition.network_aliases.get(name).cloned(),
            network_id: network.id,
            ..Default::default()
        };
        daemon
            .network_connect(name, container.id(), endpoint)
            .await
            .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
            .with_context(|| format!("Failed to connect container {} to network '{}'", container.short_id(), name))?;
        debug!("Connected container {} to network '{}'", container.short_id(), name);
    }
    Ok(())
}

#[instrument(skip(definition), fields(image = %definition.image, name = %definition.name))]
async fn create_container(mut definition: Definition) -> std::result::Result<Container, RunError> {
    definition.validate().map_err(RunError::before_create)?;
    let engine = match definition.engine.clone() {
        Some(engine) => engine,
        None => Engine::connect(&DockerEnv::from_process()).map_err(RunError::before_create)?,
    };

    let mut built_image = None;
    if let Some(build) = definition.from_dockerfile.clone() {
        let tag = build_from_dockerfile(&engine, &build, &definition.image_platform)
            .await
            .map_err(RunError::before_create)?;
        definition.image = tag.clone();
        built_image = Some((tag, build.keep_image));
    }

    let hooks = combine(&default_hooks(&definition), &definition.lifecycle_hooks);

    if definition.reuse {
        if let Some(existing) = find_reusable(&engine, &definition, &hooks)
            .await
            .map_err(RunError::before_create)?
        {
            return Ok(existing);
        }
    }

    let (config, host_config) = initial_configs(&definition);
    let mut input = CreateInput {
        definition,
        engine: engine.clone(),
        config,
        host_config,
        endpoints: HashMap::new(),
    };
    hooks
        .run_pre_create(&mut input)
        .await
        .map_err(RunError::before_create)?;

    let CreateInput {
        definition,
        mut config,
        host_config,
        endpoints,
        ..
    } = input;
    config.host_config = Some(host_config);
    if !endpoints.is_empty() {
        config.networking_config = Some(NetworkingConfig {
            endpoints_config: endpoints,
        });
    }
    let image = config.image.clone().unwrap_or_else(|| definition.image.clone());
    let request = CreateRequest {
        name: definition.name.clone(),
        platform: definition.image_platform.clone(),
        config,
    };
    let id = engine
        .daemon()
        .container_create(request)
        .await
        .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
        .with_context(|| format!("Failed to create container for image '{}'", image))
        .map_err(RunError::before_create)?;
    info!(container_id = %id, "Created container for image {}", image);

    let (built_image, keep_image) = match built_image {
        Some((tag, keep)) => (Some(tag), keep),
        None => (None, true),
    };
    let container = Container::from_parts(Parts {
        id,
        name: definition.name.clone(),
        image,
        engine,
        hooks,
        running: false,
        built_image,
        keep_image,
    });

    if let Err(e) = connect_additional_networks(&container, &definition).await {
        return Err(RunError::after_create(container, e));
    }
    if let Err(e) = container.hooks().run(HookSlot::PostCreate, &container).await {
        warn!(container_id = %container.short_id(), "PostCreate hook failed: {:#}", e);
        return Err(RunError::after_create(container, e));
    }
    Ok(container)
}
