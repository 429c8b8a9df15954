use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::process::Command;
use std::thread;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn ingress_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ingress-trafikverket"));
    cmd.env("HOME", home)
        .env_remove("INGRESS_STATE_DIR")
        .env_remove("TFV_API_AUTH_KEY")
        .env_remove("TFV_API_URL")
        .env_remove("CONTEXT_BROKER_URL")
        .env("RUST_LOG", "warn");
    cmd
}

fn with_endpoints(cmd: &mut Command, api_url: &str) {
    cmd.env("TFV_API_AUTH_KEY", "test-key")
        .env("TFV_API_URL", api_url)
        .env("CONTEXT_BROKER_URL", "http://127.0.0.1:1");
}

/// Answers one HTTP request with a 200 JSON body.
fn serve_once(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept");
        let mut reader = BufReader::new(stream);
        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).expect("read header");
            if line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().expect("content length");
                }
            }
        }
        let mut request_body = vec![0u8; content_length];
        reader.read_exact(&mut request_body).expect("read body");

        let mut stream = reader.into_inner();
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
        .expect("write response");
    });
    format!("http://{addr}/v2/data.json")
}

#[test]
fn run_without_credentials_fails() {
    let home = TempDir::new().expect("home");
    ingress_cmd(home.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("--auth-key"));
}

#[test]
fn status_reports_stopped_daemon() {
    let home = TempDir::new().expect("home");
    ingress_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("\"running\": false"))
        .stdout(contains(".ingress-trafikverket"));
}

const RUNNING_STATUS: &str = r#"{
  "running": true,
  "pid": 4242,
  "started_at": "2022-04-21T18:00:00Z",
  "updated_at": "2022-04-21T18:01:00Z",
  "streams": [
    {"name": "weather", "state": "idle", "cursor": "6790463425413230597", "cycles": 3,
     "failed_cycles": 0, "last_cycle_at": "2022-04-21T18:01:00Z", "last_report": null, "last_error": null},
    {"name": "road-accidents", "state": "running", "cursor": "0", "cycles": 2,
     "failed_cycles": 2, "last_cycle_at": null, "last_report": null,
     "last_error": "provider transport error: timed out"}
  ]
}"#;

#[test]
fn status_reads_daemon_status_file() {
    let home = TempDir::new().expect("home");
    let state = TempDir::new().expect("state");
    std::fs::write(state.path().join("status.json"), RUNNING_STATUS).expect("write status");

    ingress_cmd(home.path())
        .args(["status", "--stream", "road-accidents", "--state-dir"])
        .arg(state.path())
        .assert()
        .success()
        .stdout(contains("\"running\": true"))
        .stdout(contains("timed out"))
        .stdout(contains("6790463425413230597").not());
}

#[test]
fn status_for_unknown_stream_fails() {
    let home = TempDir::new().expect("home");
    let state = TempDir::new().expect("state");
    std::fs::write(state.path().join("status.json"), RUNNING_STATUS).expect("write status");

    ingress_cmd(home.path())
        .args(["status", "--stream", "city-works", "--state-dir"])
        .arg(state.path())
        .assert()
        .failure()
        .stderr(contains("stream 'city-works' is not configured"));
}

#[test]
fn config_lookup_is_logged_at_debug() {
    let home = TempDir::new().expect("home");
    let mut cmd = ingress_cmd(home.path());
    with_endpoints(&mut cmd, "http://127.0.0.1:1/api");
    cmd.env("RUST_LOG", "debug")
        .args(["once", "--stream", "weather"])
        .assert()
        .failure()
        .stderr(contains("no config file, using defaults"));
}

#[test]
fn once_rejects_unknown_stream() {
    let home = TempDir::new().expect("home");
    let mut cmd = ingress_cmd(home.path());
    with_endpoints(&mut cmd, "http://127.0.0.1:1/api");
    cmd.args(["once", "--stream", "ferries"])
        .assert()
        .failure()
        .stderr(contains("invalid value"));
}

#[test]
fn once_with_missing_explicit_config_fails() {
    let home = TempDir::new().expect("home");
    let mut cmd = ingress_cmd(home.path());
    with_endpoints(&mut cmd, "http://127.0.0.1:1/api");
    cmd.args(["once", "--stream", "weather", "--config"])
        .arg(home.path().join("missing.yaml"))
        .assert()
        .failure()
        .stderr(contains("failed to load config"));
}

#[test]
fn once_reports_provider_failure() {
    let home = TempDir::new().expect("home");
    let mut cmd = ingress_cmd(home.path());
    with_endpoints(&mut cmd, "http://127.0.0.1:1/api");
    cmd.args(["once", "--stream", "road-accidents"])
        .assert()
        .failure()
        .stderr(contains("road-accidents sync cycle failed"));
}

#[test]
fn once_prints_cycle_report() {
    let home = TempDir::new().expect("home");
    let api_url = serve_once(r#"{"RESPONSE":{"RESULT":[{"INFO":{"LASTCHANGEID":"7012"}}]}}"#);
    let mut cmd = ingress_cmd(home.path());
    with_endpoints(&mut cmd, &api_url);
    cmd.args(["once", "--stream", "weather", "--cursor", "7000"])
        .assert()
        .success()
        .stdout(contains("\"next_cursor\": \"7012\""))
        .stdout(contains("\"fetched\": 0"));
}

#[test]
fn once_syncs_city_works_from_configured_feed() {
    let home = TempDir::new().expect("home");
    let feed_url = serve_once(
        r#"{"type":"FeatureCollection","features":[{"type":"Feature",
            "geometry":{"type":"Point","coordinates":[17.3069,62.3908]},
            "properties":{"title":"Storgatan","description":"Ledningsarbete","start":"2022-05-02","end":"2022-06-30"}}]}"#,
    );
    let config = home.path().join("config.yaml");
    std::fs::write(
        &config,
        format!(
            "streams:\n  weather:\n    enabled: false\n  road_accidents:\n    enabled: false\n  city_works:\n    enabled: true\n    url: {feed_url}\n"
        ),
    )
    .expect("write config");

    let mut cmd = ingress_cmd(home.path());
    with_endpoints(&mut cmd, "http://127.0.0.1:1/api");
    cmd.args(["once", "--stream", "city-works", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("\"fetched\": 1"))
        .stdout(contains("\"next_cursor\": \"0\""))
        .stdout(contains("\"reconcile_failed\": 1"));
}
