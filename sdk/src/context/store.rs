//! # Docker SDK Context Store Operations
//!
//! File: sdk/src/context/store.rs
//!
//! ## Overview
//!
//! Filesystem operations over `<config-dir>/contexts/meta`.
//!
//! ## Architecture
//!
//! - **`list`**: Breadth-first walk of the meta root. A directory holding
//!   `meta.json` is a context; the walk does not descend into it.
//! - **`inspect`**: Finds a context by name. Unknown names fail with
//!   `DockerContextNotFound`, contexts without a docker host with `DockerHostNotSet`.
//! - **`create` / `delete`**: Write or remove `meta_root/<encoded-name>/`. Deleting
//!   the current context resets `currentContext` to `default`.
//! - **`current`**: `DOCKER_HOST` forces `default`; then `DOCKER_CONTEXT`; then
//!   `currentContext` from the config; then `default`.
//! - **`current_docker_host`**: The endpoint for the current context.
//!
use super::{encode_name, Context};
use crate::auth::config::{self, ClientConfig};
use crate::core::env::DockerEnv;
use crate::core::error::{Result, SdkError};
use anyhow::{anyhow, bail, Context as _};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Name of the implicit context backed by `DOCKER_HOST` or the local socket.
pub const DEFAULT_CONTEXT_NAME: &str = "default";
/// File name of a context document.
pub const META_FILE: &str = "meta.json";

#[cfg(windows)]
const DEFAULT_DOCKER_HOST: &str = "npipe:////./pipe/docker_engine";
#[cfg(not(windows))]
const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// `<config-dir>/contexts/meta`.
pub fn meta_root(env: &DockerEnv) -> Result<PathBuf> {
    Ok(config::dir(env)?.join("contexts").join("meta"))
}

fn read_meta(path: &Path) -> Result<Context> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file '{}'", path.display()))?;
    let mut ctx: Context = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse context file '{}'", path.display()))?;
    ctx.encoded_name = encode_name(&ctx.name);
    Ok(ctx)
}

/// Lists every stored context.
///
/// A missing meta root yields an empty list.
#[instrument(skip(env))]
pub fn list(env: &DockerEnv) -> Result<Vec<Context>> {
    let root = meta_root(env)?;
    if !root.is_dir() {
        debug!("No context store at {}", root.display());
        return Ok(Vec::new());
    }

    let mut contexts = Vec::new();
    let mut queue = VecDeque::from([root]);

    while let Some(dir) = queue.pop_front() {
        let meta = dir.join(META_FILE);
        if meta.is_file() {
            contexts.push(read_meta(&meta)?);
            continue;
        }
        let mut children: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read context directory '{}'", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        children.sort();
        queue.extend(children);
    }

    debug!("Found {} context(s)", contexts.len());
    Ok(contexts)
}

/// Looks up a context usable for dispatch.
///
/// # Errors
///
/// * `SdkError::DockerContextNotFound` - no context has that name.
/// * `SdkError::DockerHostNotSet` - the context has no docker endpoint host.
pub fn inspect(env: &DockerEnv, name: &str) -> Result<Context> {
    let ctx = list(env)?
        .into_iter()
        .find(|c| c.name == name)
        .ok_or_else(|| {
            anyhow!(SdkError::DockerContextNotFound {
                name: name.to_string()
            })
        })?;
    if ctx.docker_host().is_empty() {
        return Err(anyhow!(SdkError::DockerHostNotSet {
            name: name.to_string()
        }));
    }
    Ok(ctx)
}

/// Stores a new context.
///
/// The config directory must already exist.
#[instrument(skip(env, ctx), fields(context = %ctx.name))]
pub fn create(env: &DockerEnv, ctx: &Context) -> Result<Context> {
    if ctx.name.is_empty() {
        bail!("context name must not be empty");
    }
    if ctx.name == DEFAULT_CONTEXT_NAME {
        bail!("context name '{}' is reserved", DEFAULT_CONTEXT_NAME);
    }
    if list(env)?.iter().any(|c| c.name == ctx.name) {
        bail!("context '{}' already exists", ctx.name);
    }

    let mut stored = ctx.clone();
    stored.encoded_name = encode_name(&ctx.name);
    let dir = meta_root(env)?.join(&stored.encoded_name);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create context directory '{}'", dir.display()))?;
    let json = serde_json::to_string_pretty(&stored).context("Failed to serialise context")?;
    fs::write(dir.join(META_FILE), json)
        .with_context(|| format!("Failed to write context '{}'", stored.name))?;

    info!("Created context '{}'", stored.name);
    Ok(stored)
}

/// Removes a stored context.
///
/// Resets `currentContext` to `default` when the removed context was current.
#[instrument(skip(env))]
pub fn delete(env: &DockerEnv, name: &str) -> Result<()> {
    let ctx = list(env)?
        .into_iter()
        .find(|c| c.name == name)
        .ok_or_else(|| {
            anyhow!(SdkError::DockerContextNotFound {
                name: name.to_string()
            })
        })?;

    let dir = meta_root(env)?.join(&ctx.encoded_name);
    if dir.is_dir() {
        fs::remove_dir_all(&dir)
            .with_context(|| format!("Failed to remove context directory '{}'", dir.display()))?;
    } else {
        warn!(
            "Context '{}' is not stored under its encoded name, leaving its directory in place",
            name
        );
    }

    let mut cfg = config::load_or_default(env)?;
    if cfg.current_context == name {
        cfg.current_context = DEFAULT_CONTEXT_NAME.to_string();
        cfg.save(env)?;
        info!("Current context reset to '{}'", DEFAULT_CONTEXT_NAME);
    }

    info!("Deleted context '{}'", name);
    Ok(())
}

/// Makes `name` the current context in `config.json`.
pub fn use_context(env: &DockerEnv, name: &str) -> Result<()> {
    if name != DEFAULT_CONTEXT_NAME {
        inspect(env, name)?;
    }
    let mut cfg: ClientConfig = config::load_or_default(env)?;
    cfg.current_context = name.to_string();
    cfg.save(env)
}

/// Name of the current context.
pub fn current(env: &DockerEnv) -> Result<String> {
    if env.docker_host.is_some() {
        return Ok(DEFAULT_CONTEXT_NAME.to_string());
    }
    if let Some(name) = &env.docker_context {
        return Ok(name.clone());
    }
    let cfg = config::load_or_default(env)?;
    if !cfg.current_context.is_empty() {
        return Ok(cfg.current_context);
    }
    Ok(DEFAULT_CONTEXT_NAME.to_string())
}

/// Daemon endpoint of the current context.
///
/// For `default`: `DOCKER_HOST`, then the rootless socket, then the platform socket.
pub fn current_docker_host(env: &DockerEnv) -> Result<String> {
    let name = current(env)?;
    if name == DEFAULT_CONTEXT_NAME {
        if let Some(host) = &env.docker_host {
            return Ok(host.clone());
        }
        if let Some(socket) = env.rootless_socket() {
            return Ok(format!("unix://{}", socket.display()));
        }
        return Ok(DEFAULT_DOCKER_HOST.to_string());
    }
    Ok(inspect(env, &name)?.docker_host().to_string())
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TempDockerConfig;

    #[test]
    fn test_list_walks_nested_directories() {
        let tmp = TempDockerConfig::new().unwrap();
        tmp.write_context("flat", &Context::new("flat", "tcp://flat:2375")).unwrap();
        tmp.write_context("a/b/c", &Context::new("deep", "tcp://deep:2375")).unwrap();
        tmp.write_context("a/b/c/d", &Context::new("hidden", "tcp://hidden:2375"))
            .unwrap();

        let names: Vec<String> = list(&tmp.env()).unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"flat".to_string()));
        assert!(names.contains(&"deep".to_string()));
    }

    #[test]
    fn test_empty_store() {
        let tmp = TempDockerConfig::new().unwrap();
        assert!(list(&tmp.env()).unwrap().is_empty());
    }

    #[test]
    fn test_inspect_errors() {
        let tmp = TempDockerConfig::new().unwrap();
        tmp.write_context("x", &Context::new("nohost", "")).unwrap();

        let err = inspect(&tmp.env(), "nohost").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SdkError>(),
            Some(SdkError::DockerHostNotSet { .. })
        ));
        let err = inspect(&tmp.env(), "ghost").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SdkError>(),
            Some(SdkError::DockerContextNotFound { .. })
        ));
    }

    #[test]
    fn test_create_inspect_delete() {
        let tmp = TempDockerConfig::new().unwrap();
        let env = tmp.env();
        let ctx = Context::new("remote", "tcp://10.0.0.1:2376")
            .with_description("lab")
            .with_field("team", "infra");
        let stored = create(&env, &ctx).unwrap();
        assert!(tmp
            .path()
            .join("contexts/meta")
            .join(encode_name("remote"))
            .join(META_FILE)
            .is_file());

        let found = inspect(&env, "remote").unwrap();
        assert_eq!(found.metadata.additional_fields["team"], "infra");
        assert_eq!(found.encoded_name, stored.encoded_name);

        assert!(create(&env, &ctx).is_err());
        assert!(create(&env, &Context::new("default", "x")).is_err());

        use_context(&env, "remote").unwrap();
        assert_eq!(current(&env).unwrap(), "remote");
        assert_eq!(current_docker_host(&env).unwrap(), "tcp://10.0.0.1:2376");

        delete(&env, "remote").unwrap();
        assert!(list(&env).unwrap().is_empty());
        assert_eq!(current(&env).unwrap(), "default");
        assert!(delete(&env, "remote").is_err());
    }

    #[test]
    fn test_current_precedence() {
        let tmp = TempDockerConfig::new().unwrap();
        tmp.write_config(r#"{"currentContext":"from-file"}"#).unwrap();

        let env = tmp.env();
        assert_eq!(current(&env).unwrap(), "from-file");

        let env = tmp.env().docker_context("from-env");
        assert_eq!(current(&env).unwrap(), "from-env");

        let env = tmp
            .env()
            .docker_context("from-env")
            .docker_host("tcp://override:2375");
        assert_eq!(current(&env).unwrap(), "default");
        assert_eq!(current_docker_host(&env).unwrap(), "tcp://override:2375");
    }

    #[test]
    fn test_default_host_falls_back_to_rootless_socket() {
        let tmp = TempDockerConfig::new().unwrap();
        let runtime = tempfile::tempdir().unwrap();
        std::fs::write(runtime.path().join("docker.sock"), b"").unwrap();

        let env = tmp.env().xdg_runtime_dir(runtime.path());
        assert_eq!(
            current_docker_host(&env).unwrap(),
            format!("unix://{}", runtime.path().join("docker.sock").display())
        );
    }
}
