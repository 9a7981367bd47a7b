//! # Docker SDK Container Definition
//!
//! File: sdk/src/container/definition.rs
//!
//! ## Overview
//!
//! `Definition` accumulates everything needed to create a container: image (or a
//! Dockerfile to build it from), command, environment, ports, files, networks,
//! wait strategy, lifecycle hooks and raw config modifiers. Builder methods
//! consume and return the definition; `validate` runs before any daemon call.
//!
//! ## Examples
//!
//! ```rust
//! use docker_sdk::container::Definition;
//! use docker_sdk::wait;
//!
//! let definition = Definition::new("postgres:16-alpine")
//!     .with_env("POSTGRES_PASSWORD", "secret")
//!     .with_exposed_ports(["5432/tcp"])
//!     .with_wait_strategy(wait::for_log("ready to accept connections").with_occurrence(2));
//! assert!(definition.validate().is_ok());
//! ```
//!
use super::files::ContainerFile;
use super::hooks::LifecycleHooks;
use super::logs::LogConsumer;
use super::substitutor::ImageSubstitutor;
use crate::common::docker::engine::Engine;
use crate::common::docker::images::Platform;
use crate::core::error::{Result, SdkError};
use crate::wait::WaitStrategy;
use anyhow::anyhow;
use bollard::container::Config;
use bollard::models::{EndpointSettings, HostConfig};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub type ConfigModifier = Arc<dyn Fn(&mut Config<String>) + Send + Sync>;
pub type HostConfigModifier = Arc<dyn Fn(&mut HostConfig) + Send + Sync>;
pub type EndpointSettingsModifier = Arc<dyn Fn(&mut HashMap<String, EndpointSettings>) + Send + Sync>;

/// Build the image from a Dockerfile instead of pulling it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FromDockerfile {
    pub context: PathBuf,
    /// Relative to `context`; `Dockerfile` when empty.
    pub dockerfile: String,
    /// Tag of the built image; generated when empty.
    pub tag: String,
    pub build_args: HashMap<String, String>,
    /// Keep the built image when the container is terminated.
    pub keep_image: bool,
}

impl FromDockerfile {
    pub fn new(context: impl Into<PathBuf>) -> Self {
        Self {
            context: context.into(),
            ..Self::default()
        }
    }
}

/// Everything needed to create (and optionally start) a container.
#[derive(Clone)]
pub struct Definition {
    pub image: String,
    pub from_dockerfile: Option<FromDockerfile>,
    pub name: String,
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub labels: HashMap<String, String>,
    /// `<port>[/proto]`, optionally with a host binding (`8080:80`).
    pub exposed_ports: Vec<String>,
    /// Bind mounts, `src:tgt[:opts]`.
    pub binds: Vec<String>,
    pub files: Vec<ContainerFile>,
    pub networks: Vec<String>,
    pub network_aliases: HashMap<String, Vec<String>>,
    pub wait_strategy: Option<WaitStrategy>,
    pub lifecycle_hooks: Vec<LifecycleHooks>,
    pub config_modifier: Option<ConfigModifier>,
    pub host_config_modifier: Option<HostConfigModifier>,
    pub endpoint_settings_modifier: Option<EndpointSettingsModifier>,
    pub always_pull: bool,
    /// Start the container after creating it.
    pub started: bool,
    /// Reuse a container with the same name if one exists.
    pub reuse: bool,
    /// `os/arch[/variant]`.
    pub image_platform: String,
    pub image_substitutors: Vec<Arc<dyn ImageSubstitutor>>,
    pub log_consumers: Vec<Arc<dyn LogConsumer>>,
    pub log_consumer_timeout: Option<Duration>,
    /// Daemon to use; the current context's daemon when unset.
    pub engine: Option<Engine>,
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("image", &self.image)
            .field("from_dockerfile", &self.from_dockerfile)
            .field("name", &self.name)
            .field("cmd", &self.cmd)
            .field("exposed_ports", &self.exposed_ports)
            .field("networks", &self.networks)
            .field("wait_strategy", &self.wait_strategy.as_ref().map(WaitStrategy::kind))
            .field("lifecycle_hooks", &self.lifecycle_hooks.len())
            .field("started", &self.started)
            .field("reuse", &self.reuse)
            .finish_non_exhaustive()
    }
}

impl Default for Definition {
    fn default() -> Self {
        Self {
            image: String::new(),
            from_dockerfile: None,
            name: String::new(),
            entrypoint: Vec::new(),
            cmd: Vec::new(),
            env: BTreeMap::new(),
            labels: HashMap::new(),
            exposed_ports: Vec::new(),
            binds: Vec::new(),
            files: Vec::new(),
            networks: Vec::new(),
            network_aliases: HashMap::new(),
            wait_strategy: None,
            lifecycle_hooks: Vec::new(),
            config_modifier: None,
            host_config_modifier: None,
            endpoint_settings_modifier: None,
            always_pull: false,
            started: true,
            reuse: false,
            image_platform: String::new(),
            image_substitutors: Vec::new(),
            log_consumers: Vec::new(),
            log_consumer_timeout: None,
            engine: None,
        }
    }
}

fn to_strings<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().to_string()).collect()
}

impl Definition {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    pub fn from_dockerfile(build: FromDockerfile) -> Self {
        Self {
            from_dockerfile: Some(build),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_entrypoint<I: IntoIterator<Item = S>, S: AsRef<str>>(mut self, entrypoint: I) -> Self {
        self.entrypoint = to_strings(entrypoint);
        self
    }

    pub fn with_cmd<I: IntoIterator<Item = S>, S: AsRef<str>>(mut self, cmd: I) -> Self {
        self.cmd = to_strings(cmd);
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_exposed_ports<I: IntoIterator<Item = S>, S: AsRef<str>>(mut self, ports: I) -> Self {
        self.exposed_ports.extend(to_strings(ports));
        self
    }

    pub fn with_bind(mut self, bind: &str) -> Self {
        self.binds.push(bind.to_string());
        self
    }

    pub fn with_file(mut self, file: ContainerFile) -> Self {
        self.files.push(file);
        self
    }

    /// Attaches to `network` with `aliases`. The first network is passed at
    /// create time, the others are connected afterwards.
    pub fn with_network<I: IntoIterator<Item = S>, S: AsRef<str>>(mut self, network: &str, aliases: I) -> Self {
        if !self.networks.iter().any(|n| n == network) {
            self.networks.push(network.to_string());
        }
        let aliases = to_strings(aliases);
        if !aliases.is_empty() {
            self.network_aliases.insert(network.to_string(), aliases);
        }
        self
    }

    pub fn with_wait_strategy(mut self, strategy: impl Into<WaitStrategy>) -> Self {
        self.wait_strategy = Some(strategy.into());
        self
    }

    pub fn with_lifecycle_hooks(mut self, hooks: LifecycleHooks) -> Self {
        self.lifecycle_hooks.push(hooks);
        self
    }

    pub fn with_config_modifier(mut self, f: impl Fn(&mut Config<String>) + Send + Sync + 'static) -> Self {
        self.config_modifier = Some(Arc::new(f));
        self
    }

    pub fn with_host_config_modifier(mut self, f: impl Fn(&mut HostConfig) + Send + Sync + 'static) -> Self {
        self.host_config_modifier = Some(Arc::new(f));
        self
    }

    pub fn with_endpoint_settings_modifier(
        mut self,
        f: impl Fn(&mut HashMap<String, EndpointSettings>) + Send + Sync + 'static,
    ) -> Self {
        self.endpoint_settings_modifier = Some(Arc::new(f));
        self
    }

    pub fn with_always_pull(mut self, always: bool) -> Self {
        self.always_pull = always;
        self
    }

    pub fn with_started(mut self, started: bool) -> Self {
        self.started = started;
        self
    }

    pub fn with_reuse(mut self, reuse: bool) -> Self {
        self.reuse = reuse;
        self
    }

    pub fn with_image_platform(mut self, platform: &str) -> Self {
        self.image_platform = platform.to_string();
        self
    }

    pub fn with_image_substitutor(mut self, substitutor: impl ImageSubstitutor + 'static) -> Self {
        self.image_substitutors.push(Arc::new(substitutor));
        self
    }

    pub fn with_log_consumer(mut self, consumer: impl LogConsumer + 'static) -> Self {
        self.log_consumers.push(Arc::new(consumer));
        self
    }

    pub fn with_log_consumer_timeout(mut self, timeout: Duration) -> Self {
        self.log_consumer_timeout = Some(timeout);
        self
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// `KEY=VALUE` entries in key order.
    pub fn env_list(&self) -> Vec<String> {
        self.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }

    /// Binds from `binds` plus any the host config modifier adds.
    pub fn effective_binds(&self) -> Vec<String> {
        let mut host_config = HostConfig {
            binds: (!self.binds.is_empty()).then(|| self.binds.clone()),
            ..Default::default()
        };
        if let Some(modifier) = &self.host_config_modifier {
            modifier(&mut host_config);
        }
        host_config.binds.unwrap_or_default()
    }

    /// Checks the definition before any daemon call.
    ///
    /// # Errors
    ///
    /// * `SdkError::InvalidImageReference` - no image and no Dockerfile.
    /// * `SdkError::ReuseEmptyName` - reuse requested without a name.
    /// * `SdkError::InvalidPlatform` - malformed image platform.
    /// * `SdkError::InvalidBindMount` / `SdkError::DuplicateMountTarget` - bad binds.
    pub fn validate(&self) -> Result<()> {
        if self.image.is_empty() && self.from_dockerfile.is_none() {
            return Err(anyhow!(SdkError::InvalidImageReference {
                reference: String::new(),
                reason: "image must not be empty".into(),
            }));
        }
        if self.reuse && self.name.is_empty() {
            return Err(anyhow!(SdkError::ReuseEmptyName));
        }
        if !self.image_platform.is_empty() {
            Platform::parse(&self.image_platform)?;
        }
        for file in &self.files {
            file.validate()?;
        }
        for spec in &self.exposed_ports {
            super::ports::PortSpec::parse(spec)?;
        }

        let mut targets = HashSet::new();
        for bind in self.effective_binds() {
            let parts: Vec<&str> = bind.split(':').collect();
            if !(2..=3).contains(&parts.len()) {
                return Err(anyhow!(SdkError::InvalidBindMount(bind)));
            }
            let target = parts[1].to_string();
            if !targets.insert(target.clone()) {
                return Err(anyhow!(SdkError::DuplicateMountTarget(target)));
            }
        }
        Ok(())
    }
}
