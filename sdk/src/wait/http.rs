//! # Docker SDK HTTP Strategy
//!
//! File: sdk/src/wait/http.rs
//!
//! ## Overview
//!
//! Ready once an HTTP request to `host:<mapped port><path>` answers with a status
//! accepted by the status matcher (`200` by default) and, when set, a body
//! accepted by the body matcher. Without an explicit port, the lowest exposed TCP
//! port is used.
//!
//! Connection errors and unexpected responses are retried until the startup
//! timeout; only fatal container states end the wait early.
//!
use super::{poll_untimed, timed, wait_for_mapping, within, Matcher, Strategy, StrategyTarget, Timing};
use crate::container::ports::normalize_port;
use crate::core::error::{Result, SdkError};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn for_http(path: &str) -> HttpStrategy {
    HttpStrategy {
        path: path.to_string(),
        port: None,
        method: Method::GET,
        tls: false,
        insecure: false,
        headers: Vec::new(),
        body: None,
        basic_auth: None,
        status: Matcher::new(|code| *code == 200),
        response: None,
        timing: Timing::default(),
    }
}

#[derive(Debug, Clone)]
pub struct HttpStrategy {
    pub path: String,
    pub port: Option<String>,
    pub method: Method,
    pub tls: bool,
    /// Accept any server certificate.
    pub insecure: bool,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    basic_auth: Option<(String, String)>,
    status: Matcher<u16>,
    response: Option<Matcher<[u8]>>,
    timing: Timing,
}

timed!(HttpStrategy);

impl HttpStrategy {
    pub fn with_port(mut self, port: &str) -> Self {
        self.port = Some(normalize_port(port));
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_tls(mut self, insecure: bool) -> Self {
        self.tls = true;
        self.insecure = insecure;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_basic_auth(mut self, user: &str, password: &str) -> Self {
        self.basic_auth = Some((user.to_string(), password.to_string()));
        self
    }

    pub fn with_status_code_matcher(mut self, matcher: impl Fn(&u16) -> bool + Send + Sync + 'static) -> Self {
        self.status = Matcher::new(matcher);
        self
    }

    pub fn with_response_matcher(mut self, matcher: impl Fn(&[u8]) -> bool + Send + Sync + 'static) -> Self {
        self.response = Some(Matcher::new(matcher));
        self
    }

    fn url(&self, host: &str, port: u16) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        let host = if host.contains(':') {
            format!("[{}]", host)
        } else {
            host.to_string()
        };
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}:{}{}", scheme, host, port, path)
    }

    async fn resolve_port(&self, target: &dyn StrategyTarget) -> Result<String> {
        if let Some(port) = &self.port {
            return Ok(port.clone());
        }
        let inspect = target.inspect().await?;
        let mut ports: Vec<(u16, String)> = inspect
            .config
            .and_then(|c| c.exposed_ports)
            .unwrap_or_default()
            .into_keys()
            .filter(|p| p.ends_with("/tcp"))
            .filter_map(|p| Some((p.split('/').next()?.parse().ok()?, p)))
            .collect();
        ports.sort();
        ports
            .into_iter()
            .next()
            .map(|(_, p)| p)
            .ok_or_else(|| anyhow!(SdkError::PortNotFound { port: "any exposed tcp port".into() }))
    }

    async fn probe(&self, client: &reqwest::Client, url: &str) -> bool {
        let mut request = client.request(self.method.clone(), url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some((user, password)) = &self.basic_auth {
            request = request.basic_auth(user, Some(password));
        }
        if let Some(body) = &self.body {
            request = request.body(body.clone());
        }
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "HTTP request failed");
                return false;
            }
        };
        let status = response.status().as_u16();
        if !self.status.matches(&status) {
            debug!(status, "Unexpected HTTP status");
            return false;
        }
        match &self.response {
            Some(matcher) => match response.bytes().await {
                Ok(body) => matcher.matches(&body),
                Err(_) => false,
            },
            None => true,
        }
    }
}

#[async_trait]
impl Strategy for HttpStrategy {
    #[instrument(skip(self, target), fields(path = %self.path))]
    async fn wait_until_ready(&self, target: &dyn StrategyTarget) -> Result<()> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.insecure)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        within(self.timing.startup_timeout, async {
            let port = self.resolve_port(target).await?;
            let host = target.host().await?;
            let host_port = wait_for_mapping(target, &port, self.timing.poll_interval).await?;
            let url = self.url(&host, host_port);
            debug!("Probing {}", url);
            poll_untimed(target, self.timing.poll_interval, || async { Ok(self.probe(&client, &url).await) }).await
        })
        .await
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::super::fixture::FixedTarget;
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve(status_line: &'static str, body: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    status_line,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        port
    }

    #[test]
    fn test_url_formatting() {
        let s = for_http("health").with_tls(true);
        assert_eq!(s.url("::1", 8443), "https://[::1]:8443/health");
        assert_eq!(for_http("/").url("localhost", 80), "http://localhost:80/");
    }

    #[tokio::test]
    async fn test_status_and_body_matchers() {
        let port = serve("200 OK", "pong").await;
        let mut target = FixedTarget::running();
        target.ports.insert("8080/tcp".into(), port);

        for_http("/ping")
            .with_port("8080")
            .with_response_matcher(|body| body == b"pong")
            .wait_until_ready(&target)
            .await
            .unwrap();

        let err = for_http("/ping")
            .with_port("8080")
            .with_status_code_matcher(|code| *code == 204)
            .with_startup_timeout(Duration::from_millis(300))
            .with_poll_interval(Duration::from_millis(20))
            .wait_until_ready(&target)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<SdkError>(), Some(SdkError::WaitTimeout(_))));
    }

    #[tokio::test]
    async fn test_slow_port_mapping_counts_against_the_startup_timeout() {
        let port = serve("500 Internal Server Error", "").await;
        let mut target = FixedTarget::running();
        target.ports.insert("8080/tcp".into(), port);
        target.mapping_delay = Duration::from_millis(250);

        let started = tokio::time::Instant::now();
        let err = for_http("/")
            .with_port("8080")
            .with_startup_timeout(Duration::from_millis(300))
            .with_poll_interval(Duration::from_millis(20))
            .wait_until_ready(&target)
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err.downcast_ref::<SdkError>(), Some(SdkError::WaitTimeout(_))));
        assert!(elapsed < Duration::from_millis(400), "waited {:?}", elapsed);
    }
}
