//! # Docker SDK Image Operations
//!
//! File: sdk/src/common/docker/images.rs
//!
//! ## Overview
//!
//! Pull, build, remove, save and inspect images through an `Engine`.
//!
//! ## Architecture
//!
//! - **`pull_image`**: Resolves credentials for the image's registry (a lookup
//!   failure downgrades to an anonymous pull), encodes them as `X-Registry-Auth`,
//!   and drains the progress stream inside `retry`. Permanent daemon errors
//!   (`is_permanent`) are not retried.
//! - **`build_image`**: Tars the context directory (honouring `.dockerignore`),
//!   resolves credentials for every base image named in the Dockerfile, stamps the
//!   SDK labels and routes the build log: `stream` and `status` messages are logged,
//!   an `error` message fails the build with `ImageBuildFailed`.
//! - **`remove_image` / `save_image`**: Direct wrappers. Saving can be restricted to
//!   a platform, in which case the local image must match it.
//! - **`Platform`**: `os/arch[/variant]` parsing and comparison with inspected images.
//!
use super::api::PullRequest;
use super::connect::docker_credentials;
use super::engine::Engine;
use super::labels::{merge_labels, ResourceKind};
use crate::auth::config::RegistryCredential;
use crate::auth::credentials::{encode_registry_auth, is_credentials_not_found, resolve_registry_host};
use crate::auth::reference::ImageReference;
use crate::common::archive::tar::create_context_tar;
use crate::core::error::{is_permanent, Result, SdkError};
use crate::core::retry::{retry, Backoff};
use anyhow::{anyhow, Context};
use bollard::image::BuildImageOptions;
use bollard::models::{BuildInfo, CreateImageInfo, ImageDeleteResponseItem, ImageInspect};
use bytes::Bytes;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Callback receiving every pull progress message.
pub type PullHandler = Arc<dyn Fn(&CreateImageInfo) + Send + Sync>;

/// Target platform of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    pub variant: String,
}

impl Platform {
    /// Parses `os/arch[/variant]`.
    ///
    /// # Errors
    ///
    /// `SdkError::InvalidPlatform` for any other shape.
    pub fn parse(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.split('/').collect();
        let invalid = || anyhow!(SdkError::InvalidPlatform(spec.to_string()));
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }
        match parts.as_slice() {
            [os, arch] => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: String::new(),
            }),
            [os, arch, variant] => Ok(Self {
                os: os.to_string(),
                architecture: arch.to_string(),
                variant: variant.to_string(),
            }),
            _ => Err(invalid()),
        }
    }

    /// Whether an inspected image was built for this platform.
    ///
    /// The variant is only compared when both sides declare one.
    pub fn matches(&self, image: &ImageInspect) -> bool {
        let os = image.os.as_deref().unwrap_or_default();
        let arch = image.architecture.as_deref().unwrap_or_default();
        let variant = image.variant.as_deref().unwrap_or_default();
        os == self.os
            && arch == self.architecture
            && (self.variant.is_empty() || variant.is_empty() || variant == self.variant)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if !self.variant.is_empty() {
            write!(f, "/{}", self.variant)?;
        }
        Ok(())
    }
}

/// Options for `pull_image`.
#[derive(Clone, Default)]
pub struct PullOptions {
    /// `os/arch[/variant]`; empty for the daemon default.
    pub platform: String,
    pub backoff: Backoff,
    /// Receives progress messages. Without one they are logged at debug level.
    pub handler: Option<PullHandler>,
}

impl fmt::Debug for PullOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PullOptions")
            .field("platform", &self.platform)
            .field("backoff", &self.backoff)
            .field("handler", &self.handler.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Adds `:latest` to references that carry neither a tag nor a digest.
pub fn with_default_tag(image: &str) -> Result<String> {
    let reference = ImageReference::parse(image)?;
    if reference.tag.is_empty() && reference.digest.is_empty() {
        Ok(format!("{}:latest", image))
    } else {
        Ok(image.to_string())
    }
}

/// Resolves pull credentials on the blocking pool; helpers run as subprocesses.
async fn registry_auth_for(engine: &Engine, image: &str) -> Option<String> {
    let credentials = engine.credentials_arc();
    let target = image.to_string();
    let resolved = match tokio::task::spawn_blocking(move || credentials.auth_for_image(&target)).await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(image, "Credential lookup task failed, pulling anonymously: {}", e);
            return None;
        }
    };
    match resolved {
        Ok(cred) => match encode_registry_auth(&cred) {
            Ok(encoded) => Some(encoded),
            Err(e) => {
                warn!(image, "Failed to encode registry auth, pulling anonymously: {:#}", e);
                None
            }
        },
        Err(e) if is_credentials_not_found(&e) => None,
        Err(e) => {
            warn!(
                image,
                "Failed to get image auth. Setting empty credentials for the image: {:#}", e
            );
            None
        }
    }
}

/// Pulls `image`, retrying transient failures.
///
/// # Errors
///
/// `SdkError::ImagePullFailed` (wrapping the daemon error) once retries are
/// exhausted or a permanent error is reported.
#[instrument(skip(engine, options), fields(image = %image))]
pub async fn pull_image(engine: &Engine, image: &str, options: &PullOptions) -> Result<()> {
    let reference = with_default_tag(image)?;
    let registry_auth = registry_auth_for(engine, &reference).await;
    info!("Pulling image {}", reference);

    let attempt = || {
        let request = PullRequest {
            image: reference.clone(),
            platform: options.platform.clone(),
            registry_auth: registry_auth.clone(),
        };
        let handler = options.handler.clone();
        async move {
            let mut stream = engine.daemon().image_pull(request);
            while let Some(item) = stream.next().await {
                let progress = item.map_err(|e| anyhow!(SdkError::DockerApi { source: e }))?;
                match &handler {
                    Some(handler) => handler(&progress),
                    None => debug!(
                        id = progress.id.as_deref().unwrap_or_default(),
                        "{}",
                        progress.status.as_deref().unwrap_or_default()
                    ),
                }
            }
            Ok(())
        }
    };

    retry(&options.backoff, "image pull", attempt, is_permanent)
        .await
        .map_err(|e| {
            let reason = format!("{:#}", e);
            e.context(SdkError::ImagePullFailed {
                image: reference.clone(),
                reason,
            })
        })?;

    info!("Pulled image {}", reference);
    Ok(())
}

/// Whether `image` is present locally.
pub async fn image_exists(engine: &Engine, image: &str) -> Result<bool> {
    Ok(inspect_image(engine, image).await?.is_some())
}

/// Inspects a local image; `None` when it does not exist.
pub async fn inspect_image(engine: &Engine, image: &str) -> Result<Option<ImageInspect>> {
    match engine.daemon().image_inspect(image).await {
        Ok(inspect) => Ok(Some(inspect)),
        Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        }) => Ok(None),
        Err(e) => Err(anyhow!(SdkError::DockerApi { source: e }))
            .with_context(|| format!("Failed to inspect image '{}'", image)),
    }
}

/// Options for `build_image`.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Directory sent as the build context.
    pub context: PathBuf,
    /// Dockerfile path relative to `context`.
    pub dockerfile: String,
    /// Name and tag of the resulting image.
    pub tag: String,
    pub build_args: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub platform: String,
    pub no_cache: bool,
    pub backoff: Backoff,
}

impl BuildOptions {
    pub fn new(context: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            dockerfile: "Dockerfile".to_string(),
            tag: tag.into(),
            build_args: HashMap::new(),
            labels: HashMap::new(),
            platform: String::new(),
            no_cache: false,
            backoff: Backoff::default(),
        }
    }
}

/// Base images named by `FROM` lines, with `ARG` and build-arg substitution.
///
/// Stage aliases and `scratch` are skipped.
pub fn images_from_dockerfile(path: &Path, build_args: &HashMap<String, String>) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read Dockerfile '{}'", path.display()))?;
    Ok(parse_from_lines(&content, build_args))
}

fn substitute(value: &str, args: &HashMap<String, String>) -> String {
    let mut out = value.to_string();
    for (key, val) in args {
        out = out
            .replace(&format!("${{{}}}", key), val)
            .replace(&format!("${}", key), val);
    }
    out
}

fn parse_from_lines(content: &str, build_args: &HashMap<String, String>) -> Vec<String> {
    let mut args: HashMap<String, String> = HashMap::new();
    let mut stages: Vec<String> = Vec::new();
    let mut images = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let Some(instruction) = words.next() else {
            continue;
        };
        match instruction.to_ascii_uppercase().as_str() {
            "ARG" => {
                if let Some(decl) = words.next() {
                    let (name, default) = decl.split_once('=').unwrap_or((decl, ""));
                    let value = build_args
                        .get(name)
                        .cloned()
                        .unwrap_or_else(|| default.trim_matches('"').to_string());
                    args.insert(name.to_string(), value);
                }
            }
            "FROM" => {
                let rest: Vec<&str> = words.filter(|w| !w.starts_with("--")).collect();
                let Some(image) = rest.first() else {
                    continue;
                };
                let image = substitute(image, &args);
                if image != "scratch" && !stages.contains(&image) {
                    images.push(image);
                }
                if let [_, alias_kw, alias] = rest.as_slice() {
                    if alias_kw.eq_ignore_ascii_case("as") {
                        stages.push(alias.to_string());
                    }
                }
            }
            _ => {}
        }
    }
    images
}

fn route_build_message(tag: &str, message: &BuildInfo) -> Result<()> {
    if let Some(err) = &message.error {
        let detail = message
            .error_detail
            .as_ref()
            .and_then(|d| d.message.clone())
            .unwrap_or_default();
        error!(image = tag, "Build error: {} {}", err, detail);
        return Err(anyhow!(SdkError::ImageBuildFailed(err.trim().to_string())));
    }
    if let Some(stream) = &message.stream {
        let line = stream.trim_end();
        if !line.is_empty() {
            info!(image = tag, "{}", line);
        }
    } else if let Some(status) = &message.status {
        info!(
            image = tag,
            id = message.id.as_deref().unwrap_or_default(),
            progress = message.progress.as_deref().unwrap_or_default(),
            "{}",
            status
        );
    }
    Ok(())
}

async fn build_credentials(engine: &Engine, images: &[String]) -> HashMap<String, bollard::auth::DockerCredentials> {
    let credentials = engine.credentials_arc();
    let images = images.to_vec();
    let resolved = match tokio::task::spawn_blocking(move || credentials.auth_configs_for_images(&images)).await {
        Ok(Ok(found)) => found,
        Ok(Err(e)) => {
            warn!("Failed to resolve build credentials, building anonymously: {:#}", e);
            return HashMap::new();
        }
        Err(e) => {
            warn!("Credential lookup task failed, building anonymously: {}", e);
            return HashMap::new();
        }
    };
    resolved
        .into_iter()
        .map(|(registry, cred): (String, RegistryCredential)| {
            (resolve_registry_host(&registry), docker_credentials(&cred))
        })
        .collect()
}

/// Builds an image and returns its tag.
///
/// # Errors
///
/// `SdkError::ImageBuildFailed` when the daemon reports a build error; context
/// archive and daemon failures otherwise.
#[instrument(skip(engine, options), fields(image = %options.tag))]
pub async fn build_image(engine: &Engine, options: &BuildOptions) -> Result<String> {
    info!("Creating build context for '{}'", options.context.display());
    let context = Bytes::from(
        create_context_tar(&options.context, &options.dockerfile)
            .context("Failed to create build context tarball")?,
    );

    let base_images = images_from_dockerfile(&options.context.join(&options.dockerfile), &options.build_args)
        .unwrap_or_else(|e| {
            warn!("Could not read base images from Dockerfile: {:#}", e);
            Vec::new()
        });
    let credentials = build_credentials(engine, &base_images).await;

    let build_options = BuildImageOptions::<String> {
        dockerfile: options.dockerfile.clone(),
        t: options.tag.clone(),
        rm: true,
        nocache: options.no_cache,
        buildargs: options.build_args.clone(),
        labels: merge_labels(ResourceKind::Image, &options.labels),
        platform: options.platform.clone(),
        ..Default::default()
    };

    let tag = options.tag.as_str();
    let attempt = || {
        let stream = engine
            .daemon()
            .image_build(build_options.clone(), credentials.clone(), context.clone());
        async move {
            let mut stream = stream;
            while let Some(item) = stream.next().await {
                let message = item.map_err(|e| anyhow!(SdkError::DockerApi { source: e }))?;
                route_build_message(tag, &message)?;
            }
            Ok(())
        }
    };

    // A build error reported in the log is a verdict, not a transient failure.
    let is_final = |e: &anyhow::Error| {
        is_permanent(e) || matches!(e.downcast_ref::<SdkError>(), Some(SdkError::ImageBuildFailed(_)))
    };
    retry(&options.backoff, "image build", attempt, is_final).await?;

    info!("Built image {}", tag);
    Ok(tag.to_string())
}

/// Removes an image.
///
/// # Errors
///
/// `SdkError::ImageRemoveFailed` wrapping the daemon error.
#[instrument(skip(engine), fields(image = %image))]
pub async fn remove_image(engine: &Engine, image: &str, force: bool) -> Result<Vec<ImageDeleteResponseItem>> {
    match engine.daemon().image_remove(image, force, true).await {
        Ok(items) => {
            info!("Removed image {} ({} layer(s))", image, items.len());
            Ok(items)
        }
        Err(e) => {
            let reason = e.to_string();
            Err(anyhow!(SdkError::DockerApi { source: e }).context(SdkError::ImageRemoveFailed {
                image: image.to_string(),
                reason,
            }))
        }
    }
}

/// Exports `image` as a tar archive written to `output`.
///
/// With a `platform`, the local image must have been built for it.
#[instrument(skip(engine), fields(image = %image))]
pub async fn save_image(engine: &Engine, image: &str, output: &Path, platform: Option<&Platform>) -> Result<u64> {
    if let Some(platform) = platform {
        let inspect = inspect_image(engine, image)
            .await?
            .ok_or_else(|| anyhow!("image '{}' is not present locally", image))?;
        if !platform.matches(&inspect) {
            return Err(anyhow!(
                "image '{}' does not match platform {}",
                image,
                platform
            ));
        }
    }

    let mut stream = engine.daemon().image_save(image);
    let mut archive = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| anyhow!(SdkError::DockerApi { source: e }))?;
        archive.extend_from_slice(&chunk);
    }
    fs::write(output, &archive)
        .with_context(|| format!("Failed to write image archive '{}'", output.display()))?;
    debug!("Saved {} bytes to {}", archive.len(), output.display());
    Ok(archive.len() as u64)
}
