//! # Docker SDK Error Types
//!
//! File: sdk/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error taxonomy used throughout the SDK and the
//! helpers that classify error chains.
//!
//! ## Architecture
//!
//! The error system consists of four parts:
//! - `SdkError`: A `thiserror` enum carrying every domain-specific failure kind
//!   (configuration, contexts, credentials, images, readiness, validation).
//! - `Result<T>`: A type alias for `anyhow::Result<T>`. Errors are propagated with
//!   `?` and enriched with `.context(...)`; callers recover the typed kind with
//!   `downcast_ref::<SdkError>()`.
//! - `MultiError`: A joined error used where cleanup must continue after a failure
//!   (stop/terminate hooks, batch credential lookups, volume removal).
//! - Classifiers: `is_permanent_client_error` (no retry) and `is_cleanup_safe`
//!   (resource already reclaimed).
//!
//! ## Examples
//!
//! ```rust
//! use docker_sdk::core::error::{is_cleanup_safe, SdkError};
//!
//! let err = anyhow::Error::new(SdkError::ContainerNotFound { id: "abc".into() })
//!     .context("terminating container");
//! assert!(is_cleanup_safe(&err));
//! ```
//!
use std::fmt;
use thiserror::Error;

/// Custom error type for the SDK.
#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Configuration error: {0}")]
    ConfigLoad(String),

    #[error("Docker context '{name}' not found")]
    DockerContextNotFound { name: String },

    #[error("Docker host not set for context '{name}'")]
    DockerHostNotSet { name: String },

    #[error("credentials not found in native keychain")]
    CredentialsNotFound,

    #[error("no credentials server URL")]
    CredentialsMissingServerUrl,

    #[error(
        "credential helper '{helper}' failed (exit status {status}): stdout: {stdout:?}, stderr: {stderr:?}"
    )]
    HelperExec {
        helper: String,
        stdout: String,
        stderr: String,
        status: String,
    },

    #[error("credential helper '{helper}' returned an undecodable payload: {reason}")]
    HelperDecode { helper: String, reason: String },

    #[error("invalid stored auth for '{host}': {reason}")]
    InvalidStoredAuth { host: String, reason: String },

    #[error("Image pull failed for '{image}': {reason}")]
    ImagePullFailed { image: String, reason: String },

    #[error("Image build failed: {0}")]
    ImageBuildFailed(String),

    #[error("Image remove failed for '{image}': {reason}")]
    ImageRemoveFailed { image: String, reason: String },

    #[error("port {port} not found")]
    PortNotFound { port: String },

    #[error("wait strategy timed out after {0:?}")]
    WaitTimeout(std::time::Duration),

    #[error("container crashed with out-of-memory (OOMKilled)")]
    ContainerOomKilled,

    #[error("container exited with code {0}")]
    ContainerExited(i64),

    #[error("unexpected container status {0:?}")]
    ContainerUnexpectedStatus(String),

    #[error("duplicate mount target detected: {0}")]
    DuplicateMountTarget(String),

    #[error("invalid bind mount {0:?}: expected src:tgt[:opts]")]
    InvalidBindMount(String),

    #[error("invalid image reference {reference:?}: {reason}")]
    InvalidImageReference { reference: String, reason: String },

    #[error("invalid platform {0:?}: expected os/arch[/variant]")]
    InvalidPlatform(String),

    #[error("container name must be provided to reuse a container")]
    ReuseEmptyName,

    #[error("Container '{id}' not found.")]
    ContainerNotFound { id: String },

    #[error("Docker API interaction failed: {source}")]
    DockerApi {
        #[from]
        source: bollard::errors::Error,
    },
}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;

/// A collection of errors reported together.
///
/// Produced when an operation keeps going after a failure (terminate, batch
/// credential lookups). The display form joins every member on its own line.
#[derive(Debug, Default)]
pub struct MultiError {
    errors: Vec<anyhow::Error>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: anyhow::Error) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[anyhow::Error] {
        &self.errors
    }

    /// Collapses the collection: no members is success, one member is returned
    /// unchanged, several are returned wrapped in the `MultiError`.
    pub fn into_result(mut self) -> Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(anyhow::Error::new(self)),
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{:#}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

/// Reports whether a daemon error must not be retried.
///
/// Not Found, Invalid Argument, Unauthenticated, Permission Denied, Not
/// Implemented and Internal responses are permanent.
pub fn is_permanent_client_error(err: &bollard::errors::Error) -> bool {
    match err {
        bollard::errors::Error::DockerResponseServerError { status_code, .. } => {
            matches!(status_code, 400 | 401 | 403 | 404 | 500 | 501)
        }
        _ => false,
    }
}

/// Same classification as [`is_permanent_client_error`], applied to every link of
/// an `anyhow` chain.
pub fn is_permanent(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(e) = cause.downcast_ref::<bollard::errors::Error>() {
            return is_permanent_client_error(e);
        }
        matches!(
            cause.downcast_ref::<SdkError>(),
            Some(SdkError::DockerApi { source }) if is_permanent_client_error(source)
        )
    })
}

fn is_not_found_daemon_error(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn is_removal_in_progress(err: &bollard::errors::Error) -> bool {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message,
        } => message.contains("removal of container") && message.contains("already in progress"),
        _ => false,
    }
}

fn is_cleanup_safe_cause(cause: &(dyn std::error::Error + 'static)) -> bool {
    if let Some(multi) = cause.downcast_ref::<MultiError>() {
        // Every member must be safe for the joined error to be safe.
        return !multi.is_empty() && multi.errors().iter().all(is_cleanup_safe);
    }
    if let Some(e) = cause.downcast_ref::<bollard::errors::Error>() {
        return is_not_found_daemon_error(e) || is_removal_in_progress(e);
    }
    match cause.downcast_ref::<SdkError>() {
        Some(SdkError::ContainerNotFound { .. }) => true,
        Some(SdkError::DockerApi { source }) => {
            is_not_found_daemon_error(source) || is_removal_in_progress(source)
        }
        _ => false,
    }
}

/// Reports whether the error means the resource has already been reclaimed.
///
/// Walks the whole chain (context layers, wrapped sources and the members of any
/// `MultiError`). Not-found responses and "removal already in progress"
/// conflicts are cleanup-safe.
pub fn is_cleanup_safe(err: &anyhow::Error) -> bool {
    err.chain().any(is_cleanup_safe_cause)
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn server_error(status_code: u16, message: &str) -> bollard::errors::Error {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_error_display() {
        let err = SdkError::ContainerExited(137);
        assert_eq!(err.to_string(), "container exited with code 137");

        let err = SdkError::ContainerUnexpectedStatus("paused".into());
        assert_eq!(err.to_string(), "unexpected container status \"paused\"");

        let err = SdkError::ContainerOomKilled;
        assert_eq!(
            err.to_string(),
            "container crashed with out-of-memory (OOMKilled)"
        );
    }

    #[test]
    fn test_permanent_classification() {
        for code in [400u16, 401, 403, 404, 500, 501] {
            assert!(is_permanent_client_error(&server_error(code, "x")), "{code}");
        }
        for code in [409u16, 429, 502, 503] {
            assert!(!is_permanent_client_error(&server_error(code, "x")), "{code}");
        }
        let wrapped = anyhow::Error::new(SdkError::from(server_error(404, "nope")))
            .context("pulling image");
        assert!(is_permanent(&wrapped));
    }

    #[test]
    fn test_cleanup_safe_unwraps_chains() {
        let direct = anyhow::Error::new(server_error(404, "No such container"));
        assert!(is_cleanup_safe(&direct));

        let contexted = anyhow::Error::new(server_error(
            409,
            "removal of container abc is already in progress",
        ))
        .context("terminate")
        .context("cleanup");
        assert!(is_cleanup_safe(&contexted));

        let conflict = anyhow::Error::new(server_error(409, "name already in use"));
        assert!(!is_cleanup_safe(&conflict));

        assert!(!is_cleanup_safe(&anyhow!("boom")));
    }

    #[test]
    fn test_cleanup_safe_multi_error() {
        let mut all_safe = MultiError::new();
        all_safe.push(anyhow::Error::new(SdkError::ContainerNotFound { id: "a".into() }));
        all_safe.push(anyhow::Error::new(server_error(404, "no such volume")));
        assert!(is_cleanup_safe(&anyhow::Error::new(all_safe)));

        let mut mixed = MultiError::new();
        mixed.push(anyhow::Error::new(server_error(404, "gone")));
        mixed.push(anyhow!("disk on fire"));
        assert!(!is_cleanup_safe(&anyhow::Error::new(mixed)));
    }

    #[test]
    fn test_multi_error_into_result() {
        assert!(MultiError::new().into_result().is_ok());

        let mut one = MultiError::new();
        one.push(anyhow!("only"));
        let err = one.into_result().unwrap_err();
        assert_eq!(err.to_string(), "only");

        let mut two = MultiError::new();
        two.push(anyhow!("first"));
        two.push(anyhow!("second"));
        let err = two.into_result().unwrap_err();
        assert_eq!(err.to_string(), "first\nsecond");
    }
}
