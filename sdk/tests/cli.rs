//! End-to-end checks of the `dsdk` binary against a temporary config directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn dsdk(config: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("dsdk").expect("Failed to find dsdk binary for testing");
    cmd.env("DOCKER_CONFIG", config.path())
        .env_remove("DOCKER_AUTH_CONFIG")
        .env_remove("DOCKER_HOST")
        .env_remove("DOCKER_CONTEXT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_context_create_use_and_delete() {
    let config = TempDir::new().unwrap();

    dsdk(&config)
        .args(["context", "current"])
        .assert()
        .success()
        .stdout("default\n");

    dsdk(&config)
        .args(["context", "create", "remote", "--host", "tcp://10.0.0.5:2376", "--description", "build box"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created context 'remote'"));

    dsdk(&config)
        .args(["context", "create", "remote", "--host", "tcp://10.0.0.6:2376"])
        .assert()
        .failure();

    dsdk(&config).args(["context", "use", "remote"]).assert().success();
    dsdk(&config)
        .args(["context", "current"])
        .assert()
        .success()
        .stdout("remote\n");

    dsdk(&config)
        .args(["context", "ls"])
        .assert()
        .success()
        .stdout(predicate::str::contains("* remote"))
        .stdout(predicate::str::contains("build box (tcp://10.0.0.5:2376)"));

    dsdk(&config)
        .args(["context", "inspect", "remote"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tcp://10.0.0.5:2376"));

    dsdk(&config).args(["context", "delete", "remote"]).assert().success();
    dsdk(&config)
        .args(["context", "current"])
        .assert()
        .success()
        .stdout("default\n");
}

#[test]
fn test_context_env_override() {
    let config = TempDir::new().unwrap();
    dsdk(&config)
        .env("DOCKER_CONTEXT", "ci")
        .args(["context", "current"])
        .assert()
        .success()
        .stdout("ci\n");
}

#[test]
fn test_use_unknown_context_fails() {
    let config = TempDir::new().unwrap();
    dsdk(&config)
        .args(["context", "use", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_credentials_from_stored_auths() {
    let config = TempDir::new().unwrap();
    // "user:pass"
    fs::write(
        config.path().join("config.json"),
        r#"{"auths":{"some.domain":{"auth":"dXNlcjpwYXNz"}}}"#,
    )
    .unwrap();

    dsdk(&config)
        .args(["credentials", "some.domain/team/app:1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""username": "user""#))
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains(r#""pass""#).not());

    dsdk(&config)
        .args(["credentials", "--host", "some.domain", "--show-secrets"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""password": "pass""#));
}

#[test]
fn test_image_parse() {
    let config = TempDir::new().unwrap();
    dsdk(&config)
        .args(["image", "parse", "nginx"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registry:   docker.io"))
        .stdout(predicate::str::contains("repository: library/nginx"));

    dsdk(&config)
        .args(["image", "parse", "ghcr.io/org/app:1.2@sha256:0000000000000000000000000000000000000000000000000000000000000000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("registry:   ghcr.io"))
        .stdout(predicate::str::contains("tag:        1.2"))
        .stdout(predicate::str::contains("digest:     sha256:"));
}

#[test]
fn test_invalid_reference_fails() {
    let config = TempDir::new().unwrap();
    dsdk(&config)
        .args(["image", "parse", "Not A Reference"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}
