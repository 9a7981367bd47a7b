//! # Docker SDK In-Memory Daemon
//!
//! File: sdk/src/testing/daemon.rs
//!
//! ## Overview
//!
//! `FakeDaemon` implements `DaemonClient` over in-memory state so the orchestrator,
//! wait strategies and image operations can be exercised without a daemon.
//!
//! ## Behaviour
//!
//! - Containers get 64-hex ids, start in `created`, become `running` on start (host
//!   ports are assigned to every exposed or bound port) and `exited` on stop.
//! - Ids and names (with or without the leading `/`) are accepted wherever the
//!   daemon accepts either.
//! - Log streams are framed; a following stream delivers new output as it is pushed
//!   and ends when the container stops running.
//! - Exec commands answer from rules registered with `on_exec` (substring match on
//!   the joined command); unmatched commands exit 0 with no output.
//! - `fail_next(op, status, message)` makes the next call of `op` fail with a daemon
//!   error, which is how tests drive retries and failure paths.
//! - Every call is recorded as `"<op> <argument>"`.
//!
use crate::common::docker::api::{
    ByteStream, CreateRequest, DaemonClient, DaemonResult, LogsRequest, NetworkRequest,
    PullRequest,
};
use crate::common::docker::stdcopy::{encode_frame, StreamKind};
use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::Config;
use bollard::exec::CreateExecOptions;
use bollard::image::BuildImageOptions;
use bollard::models::{
    BuildInfo, ContainerConfig, ContainerInspectResponse, ContainerState, ContainerStateStatusEnum,
    CreateImageInfo, EndpointSettings, ExecInspectResponse, ImageDeleteResponseItem, ImageInspect,
    Network, NetworkSettings, PortBinding,
};
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

/// Builds a daemon response error.
pub fn daemon_error(status_code: u16, message: impl Into<String>) -> bollard::errors::Error {
    bollard::errors::Error::DockerResponseServerError {
        status_code,
        message: message.into(),
    }
}

fn not_found(what: &str, name: &str) -> bollard::errors::Error {
    daemon_error(404, format!("No such {}: {}", what, name))
}

#[derive(Debug, Default)]
struct FakeContainer {
    inspect: ContainerInspectResponse,
    logs: Vec<(i64, Bytes)>,
    files: HashMap<String, Vec<u8>>,
    uploads: Vec<(String, Vec<u8>)>,
}

impl FakeContainer {
    fn is_running(&self) -> bool {
        self.inspect
            .state
            .as_ref()
            .and_then(|s| s.running)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
struct ExecRule {
    needle: String,
    exit_code: i64,
    output: Vec<u8>,
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: u64,
    next_host_port: u16,
    containers: BTreeMap<String, FakeContainer>,
    images: HashMap<String, ImageInspect>,
    networks: BTreeMap<String, Network>,
    execs: HashMap<String, (i64, Vec<u8>)>,
    exec_rules: Vec<ExecRule>,
    failures: HashMap<String, VecDeque<bollard::errors::Error>>,
    build_failures: VecDeque<String>,
    calls: Vec<String>,
    closes: usize,
    creates: Vec<CreateRequest>,
    last_build: Option<BuildImageOptions<String>>,
    last_exec: Option<CreateExecOptions<String>>,
    removed_volumes: Vec<String>,
}

impl FakeState {
    fn record(&mut self, op: &str, arg: &str) {
        self.calls.push(format!("{} {}", op, arg).trim_end().to_string());
    }

    fn take_failure(&mut self, op: &str) -> Option<bollard::errors::Error> {
        self.failures.get_mut(op).and_then(VecDeque::pop_front)
    }

    fn new_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:064x}", self.next_id)
    }

    fn resolve(&self, id_or_name: &str) -> Option<String> {
        if self.containers.contains_key(id_or_name) {
            return Some(id_or_name.to_string());
        }
        let wanted = format!("/{}", id_or_name.trim_start_matches('/'));
        self.containers
            .iter()
            .find(|(id, c)| c.inspect.name.as_deref() == Some(wanted.as_str()) || id.starts_with(id_or_name) && id_or_name.len() >= 12)
            .map(|(id, _)| id.clone())
    }

    fn container_mut(&mut self, id_or_name: &str) -> DaemonResult<&mut FakeContainer> {
        let id = self
            .resolve(id_or_name)
            .ok_or_else(|| not_found("container", id_or_name))?;
        self.containers
            .get_mut(&id)
            .ok_or_else(|| not_found("container", id_or_name))
    }

    fn image_key(&self, image: &str) -> Option<String> {
        if self.images.contains_key(image) {
            return Some(image.to_string());
        }
        let tagged = format!("{}:latest", image);
        self.images.contains_key(&tagged).then_some(tagged)
    }

    fn allocate_port(&mut self) -> u16 {
        if self.next_host_port == 0 {
            self.next_host_port = 32768;
        }
        let port = self.next_host_port;
        self.next_host_port += 1;
        port
    }
}

/// In-memory `DaemonClient`.
#[derive(Debug, Clone)]
pub struct FakeDaemon {
    host: String,
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeDaemon {
    fn default() -> Self {
        Self::new()
    }
}

fn set_status(state: &mut ContainerState, status: ContainerStateStatusEnum, running: bool) {
    state.status = Some(status);
    state.running = Some(running);
}

impl FakeDaemon {
    pub fn new() -> Self {
        Self::with_host("tcp://127.0.0.1:2375")
    }

    pub fn with_host(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    /// Every recorded call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of recorded calls of `op`.
    pub fn call_count(&self, op: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.split_whitespace().next() == Some(op))
            .count()
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    /// Makes the next call of `op` fail with a daemon error.
    pub fn fail_next(&self, op: &str, status_code: u16, message: &str) {
        self.state
            .lock()
            .failures
            .entry(op.to_string())
            .or_default()
            .push_back(daemon_error(status_code, message));
    }

    pub fn fail_next_pull(&self, status_code: u16, message: &str) {
        self.fail_next("image_pull", status_code, message);
    }

    /// Makes the next build report `message` as a build error in its log.
    pub fn fail_next_build(&self, message: &str) {
        self.state.lock().build_failures.push_back(message.to_string());
    }

    pub fn add_image(&self, name: &str, os: &str, architecture: &str) {
        let mut state = self.state.lock();
        let id = format!("sha256:{}", state.new_id());
        state.images.insert(
            name.to_string(),
            ImageInspect {
                id: Some(id),
                repo_tags: Some(vec![name.to_string()]),
                os: Some(os.to_string()),
                architecture: Some(architecture.to_string()),
                ..Default::default()
            },
        );
    }

    pub fn has_image(&self, name: &str) -> bool {
        self.state.lock().image_key(name).is_some()
    }

    /// Creates and starts a container directly, bypassing any orchestration.
    pub fn add_running_container(&self, image: &str) -> String {
        let mut state = self.state.lock();
        let id = state.new_id();
        let container = FakeContainer {
            inspect: ContainerInspectResponse {
                id: Some(id.clone()),
                name: Some(format!("/fake-{}", &id[56..])),
                image: Some(image.to_string()),
                state: Some(ContainerState {
                    status: Some(ContainerStateStatusEnum::RUNNING),
                    running: Some(true),
                    oom_killed: Some(false),
                    exit_code: Some(0),
                    ..Default::default()
                }),
                network_settings: Some(NetworkSettings::default()),
                ..Default::default()
            },
            ..Default::default()
        };
        state.containers.insert(id.clone(), container);
        id
    }

    pub fn container_exists(&self, id_or_name: &str) -> bool {
        self.state.lock().resolve(id_or_name).is_some()
    }

    pub fn container_ids(&self) -> Vec<String> {
        self.state.lock().containers.keys().cloned().collect()
    }

    /// Mutates the state reported by `container_inspect`.
    pub fn update_state(&self, id: &str, update: impl FnOnce(&mut ContainerState)) {
        let mut state = self.state.lock();
        if let Ok(container) = state.container_mut(id) {
            update(container.inspect.state.get_or_insert_with(Default::default));
        }
    }

    /// Publishes `container_port` (`80/tcp`) on `host_port`.
    pub fn set_port(&self, id: &str, container_port: &str, host_port: u16) {
        let mut state = self.state.lock();
        if let Ok(container) = state.container_mut(id) {
            let settings = container
                .inspect
                .network_settings
                .get_or_insert_with(Default::default);
            settings.ports.get_or_insert_with(Default::default).insert(
                container_port.to_string(),
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(host_port.to_string()),
                }]),
            );
        }
    }

    /// Appends a framed log chunk.
    pub fn push_log(&self, id: &str, kind: StreamKind, data: &[u8]) {
        let now = chrono::Utc::now().timestamp();
        let mut state = self.state.lock();
        if let Ok(container) = state.container_mut(id) {
            container.logs.push((now, Bytes::from(encode_frame(kind, data))));
        }
    }

    /// Makes `path` available to `copy_from_container`.
    pub fn put_file(&self, id: &str, path: &str, content: &[u8]) {
        let mut state = self.state.lock();
        if let Ok(container) = state.container_mut(id) {
            container.files.insert(path.to_string(), content.to_vec());
        }
    }

    /// Archives received by `copy_to_container`, as `(path, archive)`.
    pub fn uploads(&self, id: &str) -> Vec<(String, Vec<u8>)> {
        let mut state = self.state.lock();
        state
            .container_mut(id)
            .map(|c| c.uploads.clone())
            .unwrap_or_default()
    }

    /// Answers execs whose joined command contains `needle`.
    pub fn on_exec(&self, needle: &str, exit_code: i64, output: Vec<u8>) {
        self.state.lock().exec_rules.push(ExecRule {
            needle: needle.to_string(),
            exit_code,
            output,
        });
    }

    pub fn last_exec(&self) -> Option<CreateExecOptions<String>> {
        self.state.lock().last_exec.clone()
    }

    pub fn last_build(&self) -> Option<BuildImageOptions<String>> {
        self.state.lock().last_build.clone()
    }

    /// Every `container_create` request received.
    pub fn creates(&self) -> Vec<CreateRequest> {
        self.state.lock().creates.clone()
    }

    pub fn network_names(&self) -> Vec<String> {
        self.state.lock().networks.keys().cloned().collect()
    }

    /// Networks `id` is attached to.
    pub fn container_networks(&self, id: &str) -> Vec<String> {
        let mut state = self.state.lock();
        state
            .container_mut(id)
            .ok()
            .and_then(|c| c.inspect.network_settings.as_ref()?.networks.clone())
            .map(|n| n.into_keys().collect())
            .unwrap_or_default()
    }

    pub fn removed_volumes(&self) -> Vec<String> {
        self.state.lock().removed_volumes.clone()
    }
}

fn single<T: Send + 'static>(item: DaemonResult<T>) -> BoxStream<'static, DaemonResult<T>> {
    stream::iter(vec![item]).boxed()
}

fn inspect_from_config(id: &str, name: &str, config: &Config<String>) -> ContainerInspectResponse {
    let networks: HashMap<String, EndpointSettings> = config
        .networking_config
        .as_ref()
        .map(|n| n.endpoints_config.clone())
        .unwrap_or_default();
    ContainerInspectResponse {
        id: Some(id.to_string()),
        name: Some(format!("/{}", name)),
        image: config.image.clone(),
        config: Some(ContainerConfig {
            image: config.image.clone(),
            labels: config.labels.clone(),
            env: config.env.clone(),
            cmd: config.cmd.clone(),
            entrypoint: config.entrypoint.clone(),
            exposed_ports: config.exposed_ports.clone(),
            ..Default::default()
        }),
        host_config: config.host_config.clone(),
        state: Some(ContainerState {
            status: Some(ContainerStateStatusEnum::CREATED),
            running: Some(false),
            oom_killed: Some(false),
            exit_code: Some(0),
            ..Default::default()
        }),
        network_settings: Some(NetworkSettings {
            networks: (!networks.is_empty()).then_some(networks),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn single_file_tar(path: &str, content: &[u8]) -> Vec<u8> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    // Writing into a Vec cannot fail.
    let _ = builder.append_data(&mut header, name, content);
    builder.into_inner().unwrap_or_default()
}

#[async_trait]
impl DaemonClient for FakeDaemon {
    fn daemon_host(&self) -> String {
        self.host.clone()
    }

    async fn container_create(&self, request: CreateRequest) -> DaemonResult<String> {
        let mut state = self.state.lock();
        let image = request.config.image.clone().unwrap_or_default();
        state.record("container_create", &image);
        if let Some(e) = state.take_failure("container_create") {
            return Err(e);
        }
        if state.image_key(&image).is_none() {
            return Err(not_found("image", &image));
        }
        if !request.name.is_empty() && state.resolve(&request.name).is_some() {
            return Err(daemon_error(
                409,
                format!("Conflict. The container name \"/{}\" is already in use", request.name),
            ));
        }
        let id = state.new_id();
        let name = if request.name.is_empty() {
            format!("fake-{}", &id[56..])
        } else {
            request.name.clone()
        };
        let inspect = inspect_from_config(&id, &name, &request.config);
        state.containers.insert(
            id.clone(),
            FakeContainer {
                inspect,
                ..Default::default()
            },
        );
        state.creates.push(request);
        Ok(id)
    }

    async fn container_start(&self, id: &str) -> DaemonResult<()> {
        let mut state = self.state.lock();
        state.record("container_start", id);
        if let Some(e) = state.take_failure("container_start") {
            return Err(e);
        }
        let container = state.container_mut(id)?;
        let mut wanted: Vec<(String, Option<String>)> = Vec::new();
        if let Some(exposed) = container.inspect.config.as_ref().and_then(|c| c.exposed_ports.as_ref()) {
            wanted.extend(exposed.keys().map(|p| (p.clone(), None)));
        }
        if let Some(bindings) = container
            .inspect
            .host_config
            .as_ref()
            .and_then(|h| h.port_bindings.as_ref())
        {
            for (port, binding) in bindings {
                let host_port = binding
                    .as_ref()
                    .and_then(|b| b.first())
                    .and_then(|b| b.host_port.clone())
                    .filter(|p| !p.is_empty());
                wanted.retain(|(p, _)| p != port);
                wanted.push((port.clone(), host_port));
            }
        }

        let mut assigned = HashMap::new();
        for (port, fixed) in wanted {
            let host_port = match fixed {
                Some(p) => p,
                None => state.allocate_port().to_string(),
            };
            assigned.insert(
                port,
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(host_port),
                }]),
            );
        }

        let container = state.container_mut(id)?;
        let settings = container
            .inspect
            .network_settings
            .get_or_insert_with(Default::default);
        settings.ports.get_or_insert_with(Default::default).extend(assigned);
        let st = container.inspect.state.get_or_insert_with(Default::default);
        set_status(st, ContainerStateStatusEnum::RUNNING, true);
        st.started_at = Some(chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    async fn container_stop(&self, id: &str, _timeout: Option<i64>) -> DaemonResult<()> {
        let mut state = self.state.lock();
        state.record("container_stop", id);
        if let Some(e) = state.take_failure("container_stop") {
            return Err(e);
        }
        let container = state.container_mut(id)?;
        let st = container.inspect.state.get_or_insert_with(Default::default);
        set_status(st, ContainerStateStatusEnum::EXITED, false);
        st.exit_code = Some(0);
        Ok(())
    }

    async fn container_remove(&self, id: &str, _force: bool, _remove_volumes: bool) -> DaemonResult<()> {
        let mut state = self.state.lock();
        state.record("container_remove", id);
        if let Some(e) = state.take_failure("container_remove") {
            return Err(e);
        }
        let key = state
            .resolve(id)
            .ok_or_else(|| not_found("container", id))?;
        state.containers.remove(&key);
        Ok(())
    }

    async fn container_inspect(&self, id: &str) -> DaemonResult<ContainerInspectResponse> {
        let mut state = self.state.lock();
        state.record("container_inspect", id);
        if let Some(e) = state.take_failure("container_inspect") {
            return Err(e);
        }
        Ok(state.container_mut(id)?.inspect.clone())
    }

    fn container_logs(&self, id: &str, request: LogsRequest) -> ByteStream {
        let key = {
            let mut state = self.state.lock();
            state.record("container_logs", id);
            if let Some(e) = state.take_failure("container_logs") {
                return single(Err(e));
            }
            match state.resolve(id) {
                Some(key) => key,
                None => return single(Err(not_found("container", id))),
            }
        };

        let wants = move |kind: u8| match kind {
            1 => request.stdout,
            2 => request.stderr,
            _ => false,
        };
        let since = request.since;
        let follow = request.follow;
        let shared = Arc::clone(&self.state);

        stream::unfold(0usize, move |mut cursor| {
            let shared = Arc::clone(&shared);
            let key = key.clone();
            async move {
                loop {
                    let (next, running) = {
                        let state = shared.lock();
                        let container = state.containers.get(&key)?;
                        let next = container
                            .logs
                            .iter()
                            .enumerate()
                            .skip(cursor)
                            .find(|(_, (ts, frame))| *ts >= since && wants(frame[0]))
                            .map(|(i, (_, frame))| (i, frame.clone()));
                        (next, container.is_running())
                    };
                    match next {
                        Some((index, frame)) => {
                            cursor = index + 1;
                            return Some((Ok(frame), cursor));
                        }
                        None if follow && running => {
                            tokio::time::sleep(Duration::from_millis(20)).await;
                        }
                        None => return None,
                    }
                }
            }
        })
        .boxed()
    }

    async fn exec_create(&self, container_id: &str, options: CreateExecOptions<String>) -> DaemonResult<String> {
        let mut state = self.state.lock();
        let joined = options.cmd.clone().unwrap_or_default().join(" ");
        state.record("exec_create", &joined);
        if let Some(e) = state.take_failure("exec_create") {
            return Err(e);
        }
        let container = state.container_mut(container_id)?;
        if !container.is_running() {
            return Err(daemon_error(409, format!("Container {} is not running", container_id)));
        }
        let answer = state
            .exec_rules
            .iter()
            .rev()
            .find(|rule| joined.contains(&rule.needle))
            .map(|rule| (rule.exit_code, rule.output.clone()))
            .unwrap_or((0, Vec::new()));
        let id = state.new_id();
        state.execs.insert(id.clone(), answer);
        state.last_exec = Some(options);
        Ok(id)
    }

    async fn exec_attach(&self, exec_id: &str, _tty: bool) -> DaemonResult<ByteStream> {
        let state = self.state.lock();
        let (_, output) = state
            .execs
            .get(exec_id)
            .ok_or_else(|| not_found("exec instance", exec_id))?;
        let chunks: Vec<DaemonResult<Bytes>> = if output.is_empty() {
            Vec::new()
        } else {
            vec![Ok(Bytes::from(output.clone()))]
        };
        Ok(stream::iter(chunks).boxed())
    }

    async fn exec_inspect(&self, exec_id: &str) -> DaemonResult<ExecInspectResponse> {
        let state = self.state.lock();
        let (exit_code, _) = state
            .execs
            .get(exec_id)
            .ok_or_else(|| not_found("exec instance", exec_id))?;
        Ok(ExecInspectResponse {
            id: Some(exec_id.to_string()),
            running: Some(false),
            exit_code: Some(*exit_code),
            ..Default::default()
        })
    }

    async fn image_inspect(&self, image: &str) -> DaemonResult<ImageInspect> {
        let mut state = self.state.lock();
        state.record("image_inspect", image);
        let key = state.image_key(image).ok_or_else(|| not_found("image", image))?;
        state
            .images
            .get(&key)
            .cloned()
            .ok_or_else(|| not_found("image", image))
    }

    fn image_pull(&self, request: PullRequest) -> BoxStream<'static, DaemonResult<CreateImageInfo>> {
        let mut state = self.state.lock();
        state.record("image_pull", &request.image);
        if let Some(e) = state.take_failure("image_pull") {
            return single(Err(e));
        }
        let (os, arch) = match request.platform.split('/').collect::<Vec<_>>().as_slice() {
            [os, arch, ..] => (os.to_string(), arch.to_string()),
            _ => ("linux".to_string(), "amd64".to_string()),
        };
        drop(state);
        self.add_image(&request.image, &os, &arch);
        let messages = vec![
            Ok(CreateImageInfo {
                status: Some(format!("Pulling from {}", request.image)),
                ..Default::default()
            }),
            Ok(CreateImageInfo {
                status: Some(format!("Status: Downloaded newer image for {}", request.image)),
                ..Default::default()
            }),
        ];
        stream::iter(messages).boxed()
    }

    fn image_build(
        &self,
        options: BuildImageOptions<String>,
        _credentials: HashMap<String, DockerCredentials>,
        _context: Bytes,
    ) -> BoxStream<'static, DaemonResult<BuildInfo>> {
        let mut state = self.state.lock();
        state.record("image_build", &options.t);
        state.last_build = Some(options.clone());
        if let Some(e) = state.take_failure("image_build") {
            return single(Err(e));
        }
        if let Some(message) = state.build_failures.pop_front() {
            return stream::iter(vec![
                Ok(BuildInfo {
                    stream: Some("Step 1/2 : FROM alpine\n".to_string()),
                    ..Default::default()
                }),
                Ok(BuildInfo {
                    error: Some(message),
                    ..Default::default()
                }),
            ])
            .boxed();
        }
        drop(state);
        self.add_image(&options.t, "linux", "amd64");
        stream::iter(vec![
            Ok(BuildInfo {
                stream: Some("Step 1/1 : FROM alpine\n".to_string()),
                ..Default::default()
            }),
            Ok(BuildInfo {
                stream: Some(format!("Successfully tagged {}\n", options.t)),
                ..Default::default()
            }),
        ])
        .boxed()
    }

    async fn image_remove(&self, image: &str, _force: bool, _prune: bool) -> DaemonResult<Vec<ImageDeleteResponseItem>> {
        let mut state = self.state.lock();
        state.record("image_remove", image);
        if let Some(e) = state.take_failure("image_remove") {
            return Err(e);
        }
        let key = state.image_key(image).ok_or_else(|| not_found("image", image))?;
        let removed = state.images.remove(&key).and_then(|i| i.id).unwrap_or_default();
        Ok(vec![
            ImageDeleteResponseItem {
                untagged: Some(key),
                deleted: None,
            },
            ImageDeleteResponseItem {
                untagged: None,
                deleted: Some(removed),
            },
        ])
    }

    fn image_save(&self, image: &str) -> ByteStream {
        let mut state = self.state.lock();
        state.record("image_save", image);
        match state.image_key(image) {
            Some(key) => single(Ok(Bytes::from(single_file_tar("manifest.json", key.as_bytes())))),
            None => single(Err(not_found("image", image))),
        }
    }

    async fn network_create(&self, request: NetworkRequest) -> DaemonResult<String> {
        let mut state = self.state.lock();
        state.record("network_create", &request.name);
        if let Some(e) = state.take_failure("network_create") {
            return Err(e);
        }
        if state.networks.contains_key(&request.name) {
            return Err(daemon_error(409, format!("network with name {} already exists", request.name)));
        }
        let id = state.new_id();
        state.networks.insert(
            request.name.clone(),
            Network {
                name: Some(request.name.clone()),
                id: Some(id.clone()),
                driver: Some(request.driver),
                internal: Some(request.internal),
                attachable: Some(request.attachable),
                enable_ipv6: Some(request.enable_ipv6),
                labels: Some(request.labels),
                options: Some(request.options),
                ..Default::default()
            },
        );
        Ok(id)
    }

    async fn network_inspect(&self, name: &str, _verbose: bool) -> DaemonResult<Network> {
        let mut state = self.state.lock();
        state.record("network_inspect", name);
        state
            .networks
            .values()
            .find(|n| n.name.as_deref() == Some(name) || n.id.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| not_found("network", name))
    }

    async fn network_connect(&self, network: &str, container_id: &str, endpoint: EndpointSettings) -> DaemonResult<()> {
        let mut state = self.state.lock();
        state.record("network_connect", network);
        if let Some(e) = state.take_failure("network_connect") {
            return Err(e);
        }
        let name = state
            .networks
            .values()
            .find(|n| n.name.as_deref() == Some(network) || n.id.as_deref() == Some(network))
            .and_then(|n| n.name.clone())
            .ok_or_else(|| not_found("network", network))?;
        let container = state.container_mut(container_id)?;
        container
            .inspect
            .network_settings
            .get_or_insert_with(Default::default)
            .networks
            .get_or_insert_with(Default::default)
            .insert(name, endpoint);
        Ok(())
    }

    async fn network_remove(&self, name: &str) -> DaemonResult<()> {
        let mut state = self.state.lock();
        state.record("network_remove", name);
        let key = state
            .networks
            .iter()
            .find(|(key, n)| key.as_str() == name || n.id.as_deref() == Some(name))
            .map(|(key, _)| key.clone())
            .ok_or_else(|| not_found("network", name))?;
        state.networks.remove(&key);
        Ok(())
    }

    async fn copy_to_container(&self, id: &str, path: &str, archive: Bytes) -> DaemonResult<()> {
        let mut state = self.state.lock();
        state.record("copy_to_container", id);
        if let Some(e) = state.take_failure("copy_to_container") {
            return Err(e);
        }
        let container = state.container_mut(id)?;
        container.uploads.push((path.to_string(), archive.to_vec()));
        Ok(())
    }

    fn copy_from_container(&self, id: &str, path: &str) -> ByteStream {
        let mut state = self.state.lock();
        state.record("copy_from_container", path);
        let container = match state.container_mut(id) {
            Ok(c) => c,
            Err(e) => return single(Err(e)),
        };
        match container.files.get(path) {
            Some(content) => single(Ok(Bytes::from(single_file_tar(path, content)))),
            None => single(Err(daemon_error(
                404,
                format!("Could not find the file {} in container {}", path, id),
            ))),
        }
    }

    async fn volume_remove(&self, name: &str, _force: bool) -> DaemonResult<()> {
        let mut state = self.state.lock();
        state.record("volume_remove", name);
        if let Some(e) = state.take_failure("volume_remove") {
            return Err(e);
        }
        state.removed_volumes.push(name.to_string());
        Ok(())
    }

    async fn close(&self) {
        let mut state = self.state.lock();
        state.record("close", "");
        state.closes += 1;
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_follow_stream_ends_when_container_stops() {
        let fake = FakeDaemon::new();
        let id = fake.add_running_container("alpine");
        fake.push_log(&id, StreamKind::Stdout, b"one\n");

        let mut stream = fake.container_logs(&id, LogsRequest::follow_from(0));
        assert_eq!(&stream.next().await.unwrap().unwrap()[8..], b"one\n");

        fake.push_log(&id, StreamKind::Stderr, b"two\n");
        assert_eq!(&stream.next().await.unwrap().unwrap()[8..], b"two\n");

        fake.container_stop(&id, None).await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_names_resolve_like_ids() {
        let fake = FakeDaemon::new();
        fake.add_image("alpine:latest", "linux", "amd64");
        let request = CreateRequest {
            name: "web".into(),
            config: Config {
                image: Some("alpine".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let id = fake.container_create(request.clone()).await.unwrap();
        assert_eq!(fake.container_inspect("web").await.unwrap().id, Some(id));
        let err = fake.container_create(request).await.unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }
}
