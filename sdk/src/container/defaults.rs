//! # Docker SDK Default Lifecycle Hooks
//!
//! File: sdk/src/container/defaults.rs
//!
//! ## Overview
//!
//! The hook sets every container runs with, ahead of (Pre slots) or after (Post
//! slots) the user's hooks:
//!
//! - **Logging**: one `info!` event per transition.
//! - **Create config**: config modifiers, the first network's endpoint and the
//!   exposed ports.
//! - **Files**: copies the definition's files after create.
//! - **Log consumers**: starts the producer after start, stops it before stop
//!   and terminate.
//! - **Readiness**: runs the wait strategy after start.
//! - **Image pull**: substitutes and pulls the image; the last PreCreate default.
//!
use super::definition::Definition;
use super::files::ContainerFile;
use super::hooks::{CreateInput, HookSlot, LifecycleHooks};
use super::logs::LogConsumer;
use super::ports::{apply_port_specs, is_container_network_mode};
use super::Container;
use crate::common::docker::images::{inspect_image, pull_image, Platform, PullOptions};
use crate::core::error::Result;
use crate::wait::{Strategy, WaitStrategy};
use bollard::models::EndpointSettings;
use futures_util::future::{ready, Ready};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default hook sets, in the order they run.
pub(crate) fn default_hooks(definition: &Definition) -> Vec<LifecycleHooks> {
    vec![
        logging_hooks(),
        create_config_hooks(),
        copy_files_hooks(definition.files.clone()),
        log_consumer_hooks(definition.log_consumers.clone(), definition.log_consumer_timeout),
        readiness_hooks(definition.wait_strategy.clone()),
        image_pull_hooks(),
    ]
}

fn announce(message: &'static str) -> impl Fn(Container) -> Ready<Result<()>> + Send + Sync + 'static {
    move |container| {
        info!(container_id = %container.short_id(), image = %container.image(), "{}", message);
        ready(Ok(()))
    }
}

fn logging_hooks() -> LifecycleHooks {
    LifecycleHooks::new()
        .pre_create(|input| {
            Box::pin(async move {
                info!(image = %input.definition.image, "Creating container for image {}", input.definition.image);
                Ok(())
            })
        })
        .on(HookSlot::PostCreate, announce("Container created"))
        .on(HookSlot::PreStart, announce("Starting container"))
        .on(HookSlot::PostStart, announce("Container started"))
        .on(HookSlot::PostReady, announce("Container is ready"))
        .on(HookSlot::PreStop, announce("Stopping container"))
        .on(HookSlot::PostStop, announce("Container stopped"))
        .on(HookSlot::PreTerminate, announce("Terminating container"))
        .on(HookSlot::PostTerminate, announce("Container terminated"))
}

/// Applies the modifiers, the first network's endpoint and the port specs.
async fn prepare_create_config(input: &mut CreateInput) -> Result<()> {
    let definition = &input.definition;
    if let Some(modifier) = &definition.config_modifier {
        modifier(&mut input.config);
    }
    if let Some(modifier) = &definition.host_config_modifier {
        modifier(&mut input.host_config);
    }

    // The create call takes a single network; the rest are connected afterwards.
    if let Some(first) = definition.networks.first() {
        match input.engine.daemon().network_inspect(first, false).await {
            Ok(network) => {
                input.endpoints.insert(
                    first.clone(),
                    EndpointSettings {
                        aliases: definition.network_aliases.get(first).cloned(),
                        network_id: network.id,
                        ..Default::default()
                    },
                );
            }
            Err(e) => warn!(network = %first, "Failed to inspect network, creating without it: {}", e),
        }
    }
    if let Some(modifier) = &definition.endpoint_settings_modifier {
        modifier(&mut input.endpoints);
    }

    let exposed = apply_port_specs(&definition.exposed_ports, &mut input.host_config)?;
    if is_container_network_mode(&input.host_config) {
        input.config.exposed_ports = None;
    } else if !exposed.is_empty() {
        input.config.exposed_ports.get_or_insert_with(Default::default).extend(exposed);
    }
    Ok(())
}

fn create_config_hooks() -> LifecycleHooks {
    LifecycleHooks::new().pre_create(|input| Box::pin(prepare_create_config(input)))
}

fn copy_files_hooks(files: Vec<ContainerFile>) -> LifecycleHooks {
    if files.is_empty() {
        return LifecycleHooks::new();
    }
    let files = Arc::new(files);
    LifecycleHooks::new().post_create(move |container| {
        let files = Arc::clone(&files);
        async move {
            for file in files.iter() {
                container.copy_file(file).await?;
            }
            Ok(())
        }
    })
}

fn log_consumer_hooks(consumers: Vec<Arc<dyn LogConsumer>>, timeout: Option<Duration>) -> LifecycleHooks {
    if consumers.is_empty() {
        return LifecycleHooks::new();
    }
    let stop = |container: Container| async move { container.stop_log_producer().await };
    LifecycleHooks::new()
        .post_start(move |container| {
            let consumers = consumers.clone();
            async move { container.start_log_producer(consumers, timeout).await }
        })
        .pre_stop(stop)
        .pre_terminate(stop)
}

fn readiness_hooks(strategy: Option<WaitStrategy>) -> LifecycleHooks {
    let Some(strategy) = strategy else {
        return LifecycleHooks::new();
    };
    let strategy = Arc::new(strategy);
    LifecycleHooks::new().post_start(move |container| {
        let strategy = Arc::clone(&strategy);
        async move {
            info!(
                container_id = %container.short_id(),
                strategy = strategy.kind(),
                "Waiting for container to be ready"
            );
            strategy.wait_until_ready(&container).await?;
            container.set_running(true);
            Ok(())
        }
    })
}

/// Runs the substitutors, then pulls the image when it is missing, when
/// `always_pull` is set, or when the local image is for another platform.
async fn pull_if_needed(input: &mut CreateInput) -> Result<()> {
    let definition = &mut input.definition;
    if definition.from_dockerfile.is_some() {
        input.config.image = Some(definition.image.clone());
        return Ok(());
    }

    let mut image = definition.image.clone();
    for substitutor in &definition.image_substitutors {
        let substituted = substitutor.substitute(&image)?;
        if substituted != image {
            info!(
                substitutor = %substitutor.description(),
                "Replacing image {} with {}", image, substituted
            );
            image = substituted;
        }
    }
    definition.image = image.clone();

    let platform = if definition.image_platform.is_empty() {
        None
    } else {
        Some(Platform::parse(&definition.image_platform)?)
    };
    let should_pull = if definition.always_pull {
        true
    } else {
        match inspect_image(&input.engine, &image).await? {
            None => true,
            Some(local) => match &platform {
                Some(platform) if !platform.matches(&local) => {
                    debug!(%platform, "Local image is for another platform");
                    true
                }
                _ => false,
            },
        }
    };
    if should_pull {
        let options = PullOptions {
            platform: definition.image_platform.clone(),
            ..Default::default()
        };
        pull_image(&input.engine, &image, &options).await?;
    }
    input.config.image = Some(image);
    Ok(())
}

fn image_pull_hooks() -> LifecycleHooks {
    LifecycleHooks::new().pre_create(|input| Box::pin(pull_if_needed(input)))
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::config::ClientConfig;
    use crate::common::docker::engine::Engine;
    use crate::container::substitutor::CustomHubSubstitutor;
    use crate::testing::FakeDaemon;
    use bollard::container::Config;
    use bollard::models::HostConfig;
    use std::collections::HashMap;

    fn input(fake: &FakeDaemon, definition: Definition) -> CreateInput {
        CreateInput {
            definition,
            engine: Engine::new(Arc::new(fake.clone()), ClientConfig::default()),
            config: Config::default(),
            host_config: HostConfig::default(),
            endpoints: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_pull_skipped_for_present_image() {
        let fake = FakeDaemon::new();
        fake.add_image("redis:7", "linux", "amd64");
        let mut input = input(&fake, Definition::new("redis:7"));
        pull_if_needed(&mut input).await.unwrap();
        assert_eq!(fake.call_count("image_pull"), 0);
        assert_eq!(input.config.image.as_deref(), Some("redis:7"));
    }

    #[tokio::test]
    async fn test_pull_when_missing_forced_or_wrong_platform() {
        let fake = FakeDaemon::new();
        let mut missing = input(&fake, Definition::new("redis:7"));
        pull_if_needed(&mut missing).await.unwrap();
        assert_eq!(fake.call_count("image_pull"), 1);

        let mut forced = input(&fake, Definition::new("redis:7").with_always_pull(true));
        pull_if_needed(&mut forced).await.unwrap();
        assert_eq!(fake.call_count("image_pull"), 2);

        fake.add_image("nginx:1", "linux", "amd64");
        let mut other_arch = input(&fake, Definition::new("nginx:1").with_image_platform("linux/arm64"));
        pull_if_needed(&mut other_arch).await.unwrap();
        assert_eq!(fake.call_count("image_pull"), 3);
    }

    #[tokio::test]
    async fn test_substituted_image_is_used() {
        let fake = FakeDaemon::new();
        let definition = Definition::new("redis:7").with_image_substitutor(CustomHubSubstitutor::new("mirror.local"));
        let mut input = input(&fake, definition);
        pull_if_needed(&mut input).await.unwrap();
        assert_eq!(input.definition.image, "mirror.local/redis:7");
        assert_eq!(input.config.image.as_deref(), Some("mirror.local/redis:7"));
        assert!(fake.has_image("mirror.local/redis:7"));
    }

    #[tokio::test]
    async fn test_first_network_endpoint_and_ports() {
        let fake = FakeDaemon::new();
        let engine = Engine::new(Arc::new(fake.clone()), ClientConfig::default());
        crate::common::docker::network::Network::create(
            &engine,
            crate::common::docker::network::NetworkOptions::named("backend"),
        )
        .await
        .unwrap();

        let definition = Definition::new("redis:7")
            .with_exposed_ports(["6379/tcp"])
            .with_network("backend", ["cache"])
            .with_config_modifier(|c| c.user = Some("redis".into()));
        let mut input = input(&fake, definition);
        prepare_create_config(&mut input).await.unwrap();

        let endpoint = &input.endpoints["backend"];
        assert_eq!(endpoint.aliases.as_deref(), Some(&["cache".to_string()][..]));
        assert!(endpoint.network_id.is_some());
        assert_eq!(input.config.user.as_deref(), Some("redis"));
        assert!(input.config.exposed_ports.unwrap().contains_key("6379/tcp"));
        assert!(input.host_config.port_bindings.unwrap().contains_key("6379/tcp"));
    }

    #[tokio::test]
    async fn test_endpoint_modifier_replaces_aliases() {
        let fake = FakeDaemon::new();
        let definition = Definition::new("redis:7")
            .with_network("missing", ["ignored"])
            .with_endpoint_settings_modifier(|endpoints| {
                endpoints.insert(
                    "missing".into(),
                    EndpointSettings {
                        aliases: Some(vec!["from-modifier".into()]),
                        ..Default::default()
                    },
                );
            });
        let mut input = input(&fake, definition);
        prepare_create_config(&mut input).await.unwrap();
        assert_eq!(
            input.endpoints["missing"].aliases.as_deref(),
            Some(&["from-modifier".to_string()][..])
        );
        assert_eq!(input.host_config.publish_all_ports, Some(true));
    }
}
