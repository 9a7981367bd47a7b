//! # Docker SDK Daemon Connection
//!
//! File: sdk/src/common/docker/connect.rs
//!
//! ## Overview
//!
//! `BollardClient` is the production `DaemonClient`: a thin adapter over
//! `bollard::Docker`. `connect_docker` resolves the endpoint of the current
//! context and opens a client for it.
//!
//! ## Architecture
//!
//! - **Endpoint selection**: `unix://` and `npipe://` use the local socket transports,
//!   `tcp://` and `http://` the plain HTTP transport. Other schemes are rejected.
//! - **Output framing**: bollard decodes attached output into `LogOutput` values.
//!   The adapter re-encodes every value as a wire frame (console output as stdout)
//!   so callers decode one format regardless of TTY mode.
//! - **Registry auth**: `PullRequest::registry_auth` carries the encoded
//!   `X-Registry-Auth` payload; it is decoded back into `DockerCredentials`, which
//!   is the form bollard expects.
//!
use super::api::{
    ByteStream, CreateRequest, DaemonClient, DaemonResult, LogsRequest, NetworkRequest,
    PullRequest,
};
use super::stdcopy::{encode_frame, StreamKind};
use crate::auth::config::RegistryCredential;
use crate::context;
use crate::core::env::DockerEnv;
use crate::core::error::{Result, SdkError};
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use bollard::auth::DockerCredentials;
use bollard::container::{
    CreateContainerOptions, DownloadFromContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StopContainerOptions, UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::{BuildImageOptions, CreateImageOptions, RemoveImageOptions};
use bollard::models::{
    BuildInfo, ContainerInspectResponse, CreateImageInfo, EndpointSettings, ExecInspectResponse,
    ImageDeleteResponseItem, ImageInspect, Network,
};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, InspectNetworkOptions};
use bollard::volume::RemoveVolumeOptions;
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Seconds before a request to the daemon times out.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// `DaemonClient` backed by `bollard`.
#[derive(Debug, Clone)]
pub struct BollardClient {
    docker: Docker,
    host: String,
}

fn frame_output(output: LogOutput) -> Bytes {
    let (kind, message) = match output {
        LogOutput::StdErr { message } => (StreamKind::Stderr, message),
        LogOutput::StdOut { message } | LogOutput::Console { message } => {
            (StreamKind::Stdout, message)
        }
        LogOutput::StdIn { message } => (StreamKind::Stdin, message),
    };
    Bytes::from(encode_frame(kind, &message))
}

/// Converts a resolved credential into bollard's representation.
pub fn docker_credentials(credential: &RegistryCredential) -> DockerCredentials {
    fn opt(value: &str) -> Option<String> {
        (!value.is_empty()).then(|| value.to_string())
    }
    DockerCredentials {
        username: opt(&credential.username),
        password: opt(&credential.password),
        auth: opt(&credential.auth_b64),
        email: opt(&credential.email),
        serveraddress: opt(&credential.server_address),
        identitytoken: opt(&credential.identity_token),
        registrytoken: opt(&credential.registry_token),
    }
}

fn decode_registry_auth(encoded: &str) -> Result<DockerCredentials> {
    let json = URL_SAFE
        .decode(encoded)
        .context("registry auth is not valid URL-safe base64")?;
    let credential: RegistryCredential =
        serde_json::from_slice(&json).context("registry auth is not a credential document")?;
    Ok(docker_credentials(&credential))
}

impl BollardClient {
    /// Opens a client for `host`.
    ///
    /// # Errors
    ///
    /// Fails for unsupported schemes and when bollard rejects the endpoint.
    #[instrument]
    pub fn connect_to(host: &str) -> Result<Self> {
        let docker = if host.starts_with("unix://") {
            connect_unix(host)?
        } else if host.starts_with("npipe://") {
            connect_named_pipe(host)?
        } else if host.starts_with("tcp://") || host.starts_with("http://") {
            Docker::connect_with_http(host, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
                .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))?
        } else {
            bail!("unsupported docker host '{}'", host);
        };
        debug!("Connected to docker daemon at {}", host);
        Ok(Self {
            docker,
            host: host.to_string(),
        })
    }

    /// Opens a client for the endpoint of the current context.
    pub fn connect(env: &DockerEnv) -> Result<Self> {
        let host = context::current_docker_host(env)?;
        Self::connect_to(&host).with_context(|| {
            format!(
                "Failed to connect to Docker daemon at '{}'. Is it running and accessible?",
                host
            )
        })
    }

    /// Wraps an existing bollard client.
    pub fn from_docker(docker: Docker, host: impl Into<String>) -> Self {
        Self {
            docker,
            host: host.into(),
        }
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }
}

#[cfg(unix)]
fn connect_unix(host: &str) -> Result<Docker> {
    Docker::connect_with_unix(host, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
}

#[cfg(not(unix))]
fn connect_unix(host: &str) -> Result<Docker> {
    bail!("unix sockets are not supported on this platform ('{}')", host)
}

#[cfg(windows)]
fn connect_named_pipe(host: &str) -> Result<Docker> {
    Docker::connect_with_named_pipe(host, REQUEST_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
        .map_err(|e| anyhow!(SdkError::DockerApi { source: e }))
}

#[cfg(not(windows))]
fn connect_named_pipe(host: &str) -> Result<Docker> {
    bail!("named pipes are only supported on Windows ('{}')", host)
}

/// Connects to the daemon of the current context.
pub fn connect_docker(env: &DockerEnv) -> Result<Arc<dyn DaemonClient>> {
    Ok(Arc::new(BollardClient::connect(env)?))
}

#[async_trait]
impl DaemonClient for BollardClient {
    fn daemon_host(&self) -> String {
        self.host.clone()
    }

    async fn container_create(&self, request: CreateRequest) -> DaemonResult<String> {
        let options = CreateContainerOptions {
            name: request.name,
            platform: (!request.platform.is_empty()).then_some(request.platform),
        };
        let response = self
            .docker
            .create_container(Some(options), request.config)
            .await?;
        for warning in &response.warnings {
            warn!(container_id = %response.id, "Daemon warning: {}", warning);
        }
        Ok(response.id)
    }

    async fn container_start(&self, id: &str) -> DaemonResult<()> {
        self.docker.start_container::<String>(id, None).await
    }

    async fn container_stop(&self, id: &str, timeout: Option<i64>) -> DaemonResult<()> {
        self.docker
            .stop_container(id, timeout.map(|t| StopContainerOptions { t }))
            .await
    }

    async fn container_remove(&self, id: &str, force: bool, remove_volumes: bool) -> DaemonResult<()> {
        let options = RemoveContainerOptions {
            v: remove_volumes,
            force,
            link: false,
        };
        self.docker.remove_container(id, Some(options)).await
    }

    async fn container_inspect(&self, id: &str) -> DaemonResult<ContainerInspectResponse> {
        self.docker.inspect_container(id, None).await
    }

    fn container_logs(&self, id: &str, request: LogsRequest) -> ByteStream {
        let options = LogsOptions::<String> {
            follow: request.follow,
            stdout: request.stdout,
            stderr: request.stderr,
            since: request.since,
            until: 0,
            timestamps: request.timestamps,
            tail: if request.tail.is_empty() {
                "all".to_string()
            } else {
                request.tail
            },
        };
        self.docker
            .logs(id, Some(options))
            .map(|item| item.map(frame_output))
            .boxed()
    }

    async fn exec_create(&self, container_id: &str, options: CreateExecOptions<String>) -> DaemonResult<String> {
        Ok(self.docker.create_exec(container_id, options).await?.id)
    }

    async fn exec_attach(&self, exec_id: &str, tty: bool) -> DaemonResult<ByteStream> {
        let options = StartExecOptions {
            detach: false,
            tty,
            output_capacity: None,
        };
        match self.docker.start_exec(exec_id, Some(options)).await? {
            StartExecResults::Attached { output, .. } => {
                Ok(output.map(|item| item.map(frame_output)).boxed())
            }
            StartExecResults::Detached => Ok(stream::empty().boxed()),
        }
    }

    async fn exec_inspect(&self, exec_id: &str) -> DaemonResult<ExecInspectResponse> {
        self.docker.inspect_exec(exec_id).await
    }

    async fn image_inspect(&self, image: &str) -> DaemonResult<ImageInspect> {
        self.docker.inspect_image(image).await
    }

    fn image_pull(&self, request: PullRequest) -> BoxStream<'static, DaemonResult<CreateImageInfo>> {
        let credentials = match request.registry_auth.as_deref().map(decode_registry_auth) {
            Some(Ok(credentials)) => Some(credentials),
            Some(Err(e)) => {
                warn!(image = %request.image, "Ignoring undecodable registry auth: {:#}", e);
                None
            }
            None => None,
        };
        let options = CreateImageOptions::<String> {
            from_image: request.image,
            platform: request.platform,
            ..Default::default()
        };
        self.docker
            .create_image(Some(options), None, credentials)
            .boxed()
    }

    fn image_build(
        &self,
        options: BuildImageOptions<String>,
        credentials: HashMap<String, DockerCredentials>,
        context: Bytes,
    ) -> BoxStream<'static, DaemonResult<BuildInfo>> {
        let credentials = (!credentials.is_empty()).then_some(credentials);
        // The bollard build stream borrows the client, so drive it from a task
        // that owns a clone and forward items over a channel.
        let docker = self.docker.clone();
        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            let mut output = docker.build_image(options, credentials, Some(context));
            while let Some(item) = output.next().await {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
    }

    async fn image_remove(&self, image: &str, force: bool, prune: bool) -> DaemonResult<Vec<ImageDeleteResponseItem>> {
        let options = RemoveImageOptions {
            force,
            noprune: !prune,
        };
        self.docker.remove_image(image, Some(options), None).await
    }

    fn image_save(&self, image: &str) -> ByteStream {
        self.docker.export_image(image).boxed()
    }

    async fn network_create(&self, request: NetworkRequest) -> DaemonResult<String> {
        let options = CreateNetworkOptions::<String> {
            name: request.name,
            driver: request.driver,
            internal: request.internal,
            attachable: request.attachable,
            enable_ipv6: request.enable_ipv6,
            labels: request.labels,
            options: request.options,
            ..Default::default()
        };
        let response = self.docker.create_network(options).await?;
        // The id field changed shape across API versions; read it from the JSON form.
        let id = serde_json::to_value(&response)
            .ok()
            .and_then(|v| v.get("Id").and_then(|id| id.as_str()).map(str::to_string))
            .unwrap_or_default();
        Ok(id)
    }

    async fn network_inspect(&self, name: &str, verbose: bool) -> DaemonResult<Network> {
        let options = InspectNetworkOptions::<String> {
            verbose,
            scope: String::new(),
        };
        self.docker.inspect_network(name, Some(options)).await
    }

    async fn network_connect(&self, network: &str, container_id: &str, endpoint: EndpointSettings) -> DaemonResult<()> {
        let options = ConnectNetworkOptions {
            container: container_id.to_string(),
            endpoint_config: endpoint,
        };
        self.docker.connect_network(network, options).await
    }

    async fn network_remove(&self, name: &str) -> DaemonResult<()> {
        self.docker.remove_network(name).await
    }

    async fn copy_to_container(&self, id: &str, path: &str, archive: Bytes) -> DaemonResult<()> {
        let options = UploadToContainerOptions::<String> {
            path: path.to_string(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(id, Some(options), archive)
            .await
    }

    fn copy_from_container(&self, id: &str, path: &str) -> ByteStream {
        let options = DownloadFromContainerOptions::<String> {
            path: path.to_string(),
        };
        self.docker
            .download_from_container(id, Some(options))
            .boxed()
    }

    async fn volume_remove(&self, name: &str, force: bool) -> DaemonResult<()> {
        self.docker
            .remove_volume(name, Some(RemoveVolumeOptions { force }))
            .await
    }

    async fn close(&self) {
        // bollard releases its connection pool when the last clone is dropped.
        debug!(host = %self.host, "Closing docker client");
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::encode_registry_auth;
    use crate::common::docker::stdcopy;

    #[test]
    fn test_console_output_is_framed_as_stdout() {
        let framed = frame_output(LogOutput::Console {
            message: Bytes::from_static(b"tty line"),
        });
        let (out, err) = stdcopy::demultiplex(&framed).unwrap();
        assert_eq!(out, b"tty line");
        assert!(err.is_empty());

        let framed = frame_output(LogOutput::StdErr {
            message: Bytes::from_static(b"boom"),
        });
        assert_eq!(framed[0], 2);
    }

    #[test]
    fn test_registry_auth_round_trip() {
        let cred = RegistryCredential {
            username: "user".into(),
            password: "pass".into(),
            server_address: "registry.example.com".into(),
            ..Default::default()
        };
        let decoded = decode_registry_auth(&encode_registry_auth(&cred).unwrap()).unwrap();
        assert_eq!(decoded.username.as_deref(), Some("user"));
        assert_eq!(decoded.password.as_deref(), Some("pass"));
        assert_eq!(decoded.serveraddress.as_deref(), Some("registry.example.com"));
        assert!(decoded.identitytoken.is_none());
        assert!(decode_registry_auth("!!not base64!!").is_err());
    }

    #[test]
    fn test_rejects_unknown_scheme() {
        let err = BollardClient::connect_to("ssh://user@host").unwrap_err();
        assert!(err.to_string().contains("unsupported docker host"));
    }

    #[tokio::test]
    async fn test_tcp_host_connects_lazily() {
        // No request is sent until the first call, so construction succeeds offline.
        let client = BollardClient::connect_to("tcp://127.0.0.1:2375").unwrap();
        assert_eq!(client.daemon_host(), "tcp://127.0.0.1:2375");
    }

    /// Requires a running Docker daemon. Run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_connect_docker_success() {
        let client = BollardClient::connect(&DockerEnv::from_process()).unwrap();
        assert!(client.docker().ping().await.is_ok());
    }
}
