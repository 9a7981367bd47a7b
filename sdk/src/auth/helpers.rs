//! # Docker SDK Credential Helper Invocation
//!
//! File: sdk/src/auth/helpers.rs
//!
//! ## Overview
//!
//! Credential helpers are external programs named `docker-credential-<name>`. The
//! resolver runs `<helper> get`, writes the registry host to its standard input and
//! reads a JSON payload `{"Username", "Secret", "ServerURL"}` from standard output.
//!
//! ## Architecture
//!
//! - **`HelperRunner`**: The capability the resolver is given. `ExecHelperRunner`
//!   searches `PATH` and spawns the process; tests substitute an in-memory runner
//!   (see `testing::MockHelperRunner`). Runners block, so async callers reach them
//!   through `tokio::task::spawn_blocking`.
//! - **`get_credential`**: Runs a helper and classifies the outcome:
//!   - exit 0 + JSON -> credential (`<token>` username turns `Secret` into an
//!     identity token);
//!   - exit != 0 with "credentials not found in native keychain" -> empty credential;
//!   - exit != 0 with "no credentials server URL" -> `CredentialsMissingServerUrl`;
//!   - any other non-zero exit -> `HelperExec`;
//!   - exit 0 with bad JSON -> `HelperDecode`;
//!   - helper missing from `PATH` -> empty credential, no error.
//!
use crate::auth::config::RegistryCredential;
use crate::core::error::{Result, SdkError};
use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, instrument, warn};

/// Prefix of every credential helper binary.
pub const HELPER_PREFIX: &str = "docker-credential-";
/// Username a helper reports when `Secret` is an identity token.
pub const TOKEN_USERNAME: &str = "<token>";
/// Helper stdout when it has no entry for the host.
pub const ERR_CREDENTIALS_NOT_FOUND: &str = "credentials not found in native keychain";
/// Helper stdout when the host was empty.
pub const ERR_CREDENTIALS_MISSING_SERVER_URL: &str = "no credentials server URL";

/// Raw result of running a helper process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HelperOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code; `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl HelperOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs credential helper programs.
pub trait HelperRunner: Send + Sync + fmt::Debug {
    /// Runs `program` with `args`, feeding `stdin`.
    ///
    /// Returns `Ok(None)` when the program is not installed.
    fn run(&self, program: &str, args: &[&str], stdin: &str) -> Result<Option<HelperOutput>>;

    /// Whether `program` can be found.
    fn has_program(&self, program: &str) -> bool;
}

/// Production runner: `PATH` lookup plus `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecHelperRunner;

impl ExecHelperRunner {
    fn lookup(program: &str) -> Option<PathBuf> {
        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths).find_map(|dir| {
            let candidate = dir.join(program);
            if candidate.is_file() {
                return Some(candidate);
            }
            if cfg!(windows) {
                let exe = dir.join(format!("{program}.exe"));
                if exe.is_file() {
                    return Some(exe);
                }
            }
            None
        })
    }
}

impl HelperRunner for ExecHelperRunner {
    fn run(&self, program: &str, args: &[&str], stdin: &str) -> Result<Option<HelperOutput>> {
        let Some(path) = Self::lookup(program) else {
            debug!("Credential helper '{}' not found on PATH", program);
            return Ok(None);
        };

        let mut child = Command::new(&path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn credential helper '{}'", path.display()))?;

        if let Some(mut input) = child.stdin.take() {
            // A helper that exits early closes the pipe; its exit status tells the story.
            if let Err(e) = input.write_all(stdin.as_bytes()) {
                debug!("Writing to credential helper stdin failed: {}", e);
            }
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for credential helper '{}'", path.display()))?;

        Ok(Some(HelperOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.status.code(),
        }))
    }

    fn has_program(&self, program: &str) -> bool {
        Self::lookup(program).is_some()
    }
}

#[derive(Deserialize)]
struct HelperPayload {
    #[serde(rename = "Username", default)]
    username: String,
    #[serde(rename = "Secret", default)]
    secret: String,
    #[serde(rename = "ServerURL", default)]
    server_url: String,
}

/// Full binary name of helper `name`.
pub fn helper_program(name: &str) -> String {
    format!("{HELPER_PREFIX}{name}")
}

/// Fetches the credential stored by helper `name` for `host`.
#[instrument(skip(runner), fields(helper = %name))]
pub fn get_credential(runner: &dyn HelperRunner, name: &str, host: &str) -> Result<RegistryCredential> {
    let program = helper_program(name);
    let Some(output) = runner.run(&program, &["get"], host)? else {
        return Ok(RegistryCredential::default());
    };

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

    if !output.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stdout == ERR_CREDENTIALS_NOT_FOUND {
            debug!("Helper '{}' has no credentials for {}", program, host);
            return Ok(RegistryCredential::default());
        }
        if stdout == ERR_CREDENTIALS_MISSING_SERVER_URL {
            return Err(anyhow!(SdkError::CredentialsMissingServerUrl));
        }
        let status = output
            .exit_code
            .map_or_else(|| "killed by signal".to_string(), |c| c.to_string());
        warn!("Credential helper '{}' failed with status {}", program, status);
        return Err(anyhow!(SdkError::HelperExec {
            helper: program,
            stdout,
            stderr,
            status,
        }));
    }

    let payload: HelperPayload = serde_json::from_str(&stdout).map_err(|e| {
        anyhow!(SdkError::HelperDecode {
            helper: program.clone(),
            reason: e.to_string(),
        })
    })?;

    let server_address = if payload.server_url.is_empty() {
        host.to_string()
    } else {
        payload.server_url
    };

    if payload.username == TOKEN_USERNAME {
        return Ok(RegistryCredential {
            username: String::new(),
            password: payload.secret.clone(),
            identity_token: payload.secret,
            server_address,
            ..RegistryCredential::default()
        });
    }

    Ok(RegistryCredential {
        username: payload.username,
        password: payload.secret,
        server_address,
        ..RegistryCredential::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHelperRunner;

    #[test]
    fn test_success_payload() {
        let runner = MockHelperRunner::new().respond(
            "docker-credential-desktop",
            0,
            r#"{"Username":"alice","Secret":"s3cret","ServerURL":"https://reg.example"}"#,
            "",
        );
        let cred = get_credential(&runner, "desktop", "reg.example").unwrap();
        assert_eq!(cred.username, "alice");
        assert_eq!(cred.password, "s3cret");
        assert_eq!(cred.server_address, "https://reg.example");
        assert_eq!(runner.stdin_seen("docker-credential-desktop"), vec!["reg.example"]);
    }

    #[test]
    fn test_identity_token_payload() {
        let runner = MockHelperRunner::new().respond(
            "docker-credential-desktop",
            0,
            r#"{"Username":"<token>","Secret":"xyz"}"#,
            "",
        );
        let cred = get_credential(&runner, "desktop", "reg.example").unwrap();
        assert_eq!(cred.username, "");
        assert_eq!(cred.password, "xyz");
        assert_eq!(cred.server_address, "reg.example");
    }

    #[test]
    fn test_failure_classification() {
        let runner = MockHelperRunner::new()
            .respond("docker-credential-a", 1, "credentials not found in native keychain\n", "")
            .respond("docker-credential-b", 1, "no credentials server URL", "")
            .respond("docker-credential-c", 2, "boom", "stack trace")
            .respond("docker-credential-d", 0, "not json", "");

        assert!(get_credential(&runner, "a", "h").unwrap().is_empty());

        let err = get_credential(&runner, "b", "h").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SdkError>(),
            Some(SdkError::CredentialsMissingServerUrl)
        ));

        let err = get_credential(&runner, "c", "h").unwrap_err();
        match err.downcast_ref::<SdkError>() {
            Some(SdkError::HelperExec { helper, stdout, stderr, status }) => {
                assert_eq!(helper, "docker-credential-c");
                assert_eq!(stdout, "boom");
                assert_eq!(stderr, "stack trace");
                assert_eq!(status, "2");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = get_credential(&runner, "d", "h").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SdkError>(),
            Some(SdkError::HelperDecode { .. })
        ));
    }

    #[test]
    fn test_missing_helper_is_empty() {
        let runner = MockHelperRunner::new();
        assert!(get_credential(&runner, "nowhere", "h").unwrap().is_empty());
    }
}
