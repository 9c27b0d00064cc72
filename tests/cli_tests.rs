//! End-to-end runs of the `licwatch` binary.

use std::path::Path;
use std::process::Output;

use chrono::{Local, TimeDelta};
use serde_json::json;
use tokio::process::Command;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn run_licwatch(args: &[&str]) -> Output {
    let workdir = tempfile::tempdir().expect("temp workdir");
    run_licwatch_in(workdir.path(), args).await
}

async fn run_licwatch_in(workdir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_licwatch"))
        .args(args)
        .current_dir(workdir)
        .env_remove("RUST_LOG")
        .output()
        .await
        .expect("run licwatch")
}

/// Portal that authenticates but has no federated servers.
async fn portal_without_hosting_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/portal/sharing/rest/generateToken"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": "tok", "expires": 0})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/portal/sharing/rest/portals/self/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "servers": [] })))
        .mount(&server)
        .await;

    server
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

async fn portal_with_features(features: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/portal/sharing/rest/generateToken"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"token": "tok", "expires": 0})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/portal/sharing/rest/portals/self/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "servers": [{
                "id": "h",
                "name": "hosting",
                "url": format!("{}/server", server.uri()),
                "adminUrl": format!("{}/server", server.uri()),
                "isHosted": true,
                "serverRole": "HOSTING_SERVER"
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/server/admin/system/licenses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "features": features })))
        .mount(&server)
        .await;

    server
}

fn days_from_now(days: i64) -> i64 {
    (Local::now() + TimeDelta::days(days)).timestamp_millis()
}

#[tokio::test]
async fn non_http_url_prints_usage_and_fails() {
    let output = run_licwatch(&["gis.example.com", "admin", "secret"]).await;

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("<url> <username> <password>"));
}

#[tokio::test]
async fn too_few_arguments_prints_usage_and_fails() {
    let output = run_licwatch(&["https://gis.example.com/portal"]).await;

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Usage:"));
}

#[tokio::test]
async fn expiring_license_fails_the_run() {
    let server = portal_with_features(json!([
        {"displayName": "Network Analyst", "expiration": days_from_now(10)},
        {"displayName": "ArcGIS Server", "expiration": days_from_now(200)}
    ]))
    .await;
    let url = format!("{}/portal", server.uri());

    let output = run_licwatch(&["--dry-run", &url, "admin", "secret"]).await;
    let out = stdout(&output);

    assert_eq!(output.status.code(), Some(1));
    assert!(out.contains("Network Analyst: Requires Attention"));
    assert!(out.contains("ArcGIS Server: Valid"));
    assert!(out.contains("Features expiring soon or expired:"));
    assert!(out.contains("- Network Analyst"));
}

#[tokio::test]
async fn valid_licenses_succeed() {
    let server = portal_with_features(json!([
        {"displayName": "ArcGIS Server", "expiration": days_from_now(200)}
    ]))
    .await;
    let url = format!("{}/portal", server.uri());

    let output = run_licwatch(&["--dry-run", &url, "admin", "secret"]).await;

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("All Licenses Ok!"));
}

#[tokio::test]
async fn missing_smtp_settings_fail_before_sending() {
    let server = portal_with_features(json!([])).await;
    let url = format!("{}/portal", server.uri());

    let output = Command::new(env!("CARGO_BIN_EXE_licwatch"))
        .args([url.as_str(), "admin", "secret"])
        .current_dir(tempfile::tempdir().expect("temp workdir").path())
        .env_remove("SMTP_SERVER")
        .env_remove("SMTP_USERNAME")
        .env_remove("SMTP_PASSWORD")
        .output()
        .await
        .expect("run licwatch");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("SMTP_SERVER"));
}

#[tokio::test]
async fn flags_after_positionals_are_recognised() {
    let server = portal_with_features(json!([
        {"displayName": "ArcGIS Server", "expiration": days_from_now(200)}
    ]))
    .await;
    let url = format!("{}/portal", server.uri());

    let output = run_licwatch(&[url.as_str(), "admin", "secret", "--dry-run"]).await;

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("ArcGIS Server: Valid"));
}

#[tokio::test]
async fn missing_hosting_server_reports_all_ok_by_default() {
    let server = portal_without_hosting_server().await;
    let url = format!("{}/portal", server.uri());

    let output = run_licwatch(&["--dry-run", &url, "admin", "secret"]).await;

    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("All Licenses Ok!"));
}

#[tokio::test]
async fn missing_hosting_server_fails_when_required() {
    let server = portal_without_hosting_server().await;
    let url = format!("{}/portal", server.uri());

    let workdir = tempfile::tempdir().expect("temp workdir");
    let config_path = workdir.path().join("strict.toml");
    std::fs::write(&config_path, "[report]\nrequire_hosting_server = true\n")
        .expect("write config");
    let config_arg = config_path.to_string_lossy().into_owned();

    let output = run_licwatch_in(
        workdir.path(),
        &["--config", &config_arg, "--dry-run", &url, "admin", "secret"],
    )
    .await;

    assert_eq!(output.status.code(), Some(1));
    assert!(!stdout(&output).contains("All Licenses Ok!"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no hosting server"));
}
