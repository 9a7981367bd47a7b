//! # Docker SDK Daemon Client Interface
//!
//! File: sdk/src/common/docker/api.rs
//!
//! ## Overview
//!
//! `DaemonClient` is the seam between the SDK and the daemon's remote API. The
//! production implementation (`connect::BollardClient`) forwards to `bollard`;
//! `testing::FakeDaemon` keeps everything in memory.
//!
//! ## Conventions
//!
//! - Request and response payloads are `bollard` models, and errors are
//!   `bollard::errors::Error`, so status-code classification (`404`, `409`, ...)
//!   works the same for every implementation.
//! - Attached output (container logs, exec) is delivered in the daemon's wire
//!   format: frames with an 8-byte header `{stream, 0, 0, 0, len(4, BE)}`. TTY
//!   output is delivered as stdout frames. `stdcopy` decodes the frames.
//! - Streaming calls return `'static` boxed streams so callers can move them into
//!   spawned tasks.
//!
use async_trait::async_trait;
use bollard::container::Config;
use bollard::exec::CreateExecOptions;
use bollard::image::BuildImageOptions;
use bollard::models::{
    BuildInfo, ContainerInspectResponse, CreateImageInfo, EndpointSettings, ExecInspectResponse,
    ImageDeleteResponseItem, ImageInspect, Network,
};
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::collections::HashMap;

/// Result type at the daemon seam.
pub type DaemonResult<T> = std::result::Result<T, bollard::errors::Error>;

/// A stream of raw bytes from the daemon.
pub type ByteStream = BoxStream<'static, DaemonResult<Bytes>>;

/// Options for `container_create`.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    /// Container name; empty lets the daemon pick one.
    pub name: String,
    /// `os/arch[/variant]`; empty for the daemon default.
    pub platform: String,
    pub config: Config<String>,
}

/// Options for `container_logs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogsRequest {
    pub follow: bool,
    pub stdout: bool,
    pub stderr: bool,
    /// Unix seconds; `0` means from the beginning.
    pub since: i64,
    pub timestamps: bool,
    /// `all` or a line count.
    pub tail: String,
}

impl LogsRequest {
    /// Both streams, whole history, no follow.
    pub fn all() -> Self {
        Self {
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Self::default()
        }
    }

    /// Both streams, following new output.
    pub fn follow_from(since: i64) -> Self {
        Self {
            follow: true,
            since,
            ..Self::all()
        }
    }
}

/// Options for `image_pull`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequest {
    /// Reference including a tag or digest.
    pub image: String,
    pub platform: String,
    /// URL-safe base64 JSON credential (`X-Registry-Auth`).
    pub registry_auth: Option<String>,
}

/// Options for `network_create`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkRequest {
    pub name: String,
    pub driver: String,
    pub internal: bool,
    pub attachable: bool,
    pub enable_ipv6: bool,
    pub labels: HashMap<String, String>,
    pub options: HashMap<String, String>,
}

/// Operations the SDK needs from a container daemon.
#[async_trait]
pub trait DaemonClient: Send + Sync {
    /// Endpoint the client talks to (`unix:///var/run/docker.sock`, `tcp://...`).
    fn daemon_host(&self) -> String;

    /// Creates a container and returns its id.
    async fn container_create(&self, request: CreateRequest) -> DaemonResult<String>;
    async fn container_start(&self, id: &str) -> DaemonResult<()>;
    /// `timeout` in seconds; `None` uses the daemon default, negative waits forever.
    async fn container_stop(&self, id: &str, timeout: Option<i64>) -> DaemonResult<()>;
    async fn container_remove(&self, id: &str, force: bool, remove_volumes: bool) -> DaemonResult<()>;
    async fn container_inspect(&self, id: &str) -> DaemonResult<ContainerInspectResponse>;
    /// Framed log output.
    fn container_logs(&self, id: &str, request: LogsRequest) -> ByteStream;

    /// Creates an exec instance and returns its id.
    async fn exec_create(&self, container_id: &str, options: CreateExecOptions<String>) -> DaemonResult<String>;
    /// Starts an exec instance and returns its framed output.
    async fn exec_attach(&self, exec_id: &str, tty: bool) -> DaemonResult<ByteStream>;
    async fn exec_inspect(&self, exec_id: &str) -> DaemonResult<ExecInspectResponse>;

    async fn image_inspect(&self, image: &str) -> DaemonResult<ImageInspect>;
    /// JSON progress messages of a pull. The pull is complete when the stream ends.
    fn image_pull(&self, request: PullRequest) -> BoxStream<'static, DaemonResult<CreateImageInfo>>;
    /// JSON build log messages. `context` is a (gzipped) tar archive.
    fn image_build(
        &self,
        options: BuildImageOptions<String>,
        credentials: HashMap<String, bollard::auth::DockerCredentials>,
        context: Bytes,
    ) -> BoxStream<'static, DaemonResult<BuildInfo>>;
    async fn image_remove(&self, image: &str, force: bool, prune: bool) -> DaemonResult<Vec<ImageDeleteResponseItem>>;
    /// Tar export of an image.
    fn image_save(&self, image: &str) -> ByteStream;

    /// Creates a network and returns its id.
    async fn network_create(&self, request: NetworkRequest) -> DaemonResult<String>;
    async fn network_inspect(&self, name: &str, verbose: bool) -> DaemonResult<Network>;
    async fn network_connect(&self, network: &str, container_id: &str, endpoint: EndpointSettings) -> DaemonResult<()>;
    async fn network_remove(&self, name: &str) -> DaemonResult<()>;

    /// Extracts `archive` (tar, optionally gzipped) at `path` inside the container.
    async fn copy_to_container(&self, id: &str, path: &str, archive: Bytes) -> DaemonResult<()>;
    /// Tar stream of `path` inside the container.
    fn copy_from_container(&self, id: &str, path: &str) -> ByteStream;

    async fn volume_remove(&self, name: &str, force: bool) -> DaemonResult<()>;

    /// Releases the connection. Further calls are not expected.
    async fn close(&self);
}
