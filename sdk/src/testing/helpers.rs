//! # Docker SDK Scripted Credential Helpers
//!
//! File: sdk/src/testing/helpers.rs
//!
//! ## Overview
//!
//! `MockHelperRunner` answers credential-helper invocations from a table of scripted
//! responses instead of spawning processes. Programs without a response are
//! reported as not installed. Every call is counted and its stdin recorded.
//!
use crate::auth::helpers::{HelperOutput, HelperRunner};
use crate::core::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;

/// `HelperRunner` driven by scripted responses.
#[derive(Debug, Default)]
pub struct MockHelperRunner {
    responses: HashMap<String, HelperOutput>,
    stdin: Mutex<HashMap<String, Vec<String>>>,
}

impl MockHelperRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the output of `program` (for example `docker-credential-desktop`).
    pub fn respond(mut self, program: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.responses.insert(
            program.to_string(),
            HelperOutput {
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
                exit_code: Some(exit_code),
            },
        );
        self
    }

    /// Stdin payloads `program` received, oldest first.
    pub fn stdin_seen(&self, program: &str) -> Vec<String> {
        self.stdin.lock().get(program).cloned().unwrap_or_default()
    }

    /// How many times `program` ran.
    pub fn calls(&self, program: &str) -> usize {
        self.stdin.lock().get(program).map_or(0, Vec::len)
    }
}

impl HelperRunner for MockHelperRunner {
    fn run(&self, program: &str, _args: &[&str], stdin: &str) -> Result<Option<HelperOutput>> {
        let Some(output) = self.responses.get(program) else {
            return Ok(None);
        };
        self.stdin
            .lock()
            .entry(program.to_string())
            .or_default()
            .push(stdin.to_string());
        Ok(Some(output.clone()))
    }

    fn has_program(&self, program: &str) -> bool {
        self.responses.contains_key(program)
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscripted_program_is_not_installed() {
        let runner = MockHelperRunner::new().respond("docker-credential-x", 0, "{}", "");
        assert!(runner.has_program("docker-credential-x"));
        assert!(!runner.has_program("docker-credential-y"));
        assert!(runner.run("docker-credential-y", &["get"], "h").unwrap().is_none());
        assert_eq!(runner.calls("docker-credential-y"), 0);

        let out = runner.run("docker-credential-x", &["get"], "h").unwrap().unwrap();
        assert!(out.success());
        assert_eq!(runner.calls("docker-credential-x"), 1);
    }
}
