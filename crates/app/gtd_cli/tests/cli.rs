use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gtd() -> Command {
    let mut cmd = Command::cargo_bin("gtd").unwrap();
    cmd.env_remove("GTD_AUTH_URL").env("RUST_LOG", "error");
    cmd
}

#[test]
fn version_prints_package_name() {
    gtd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gtd_cli"));
}

#[test]
fn missing_arguments_are_a_usage_error() {
    gtd().arg("login").assert().failure().code(2);
}

#[test]
fn unreachable_service_exits_with_failure() {
    gtd()
        .args(["--auth-url", "http://127.0.0.1:9", "--retry-max", "1"])
        .args(["validate", "abc"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn validate_prints_the_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/validate"))
        .and(body_json(json!({"access_uuid": "abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        gtd()
            .args(["--auth-url", &uri, "validate", "abc"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert!(output.status.success());
    let reply: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(reply, json!({"valid": true}));
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_login_exits_with_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "user_not_found",
            "message": "user not found"
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let output = tokio::task::spawn_blocking(move || {
        gtd()
            .args(["--auth-url", &uri, "login", "alice", "wrong"])
            .output()
            .unwrap()
    })
    .await
    .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
}
