//! Commands that talk to the Actions API, against a local canned-response server.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// One canned reply: requests whose path contains `path` get `status` and `body`.
struct Route {
    path: &'static str,
    status: u16,
    body: String,
}

fn route(path: &'static str, status: u16, body: serde_json::Value) -> Route {
    Route {
        path,
        status,
        body: body.to_string(),
    }
}

/// Serve `routes` on an ephemeral port until the test process exits.
fn serve(routes: Vec<Route>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            respond(stream, &routes);
        }
    });
    port
}

fn respond(stream: TcpStream, routes: &[Route]) {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header == "\r\n" => break,
            Ok(_) => {}
        }
    }
    let path = request_line.split_whitespace().nth(1).unwrap_or("/");
    let (status, body) = routes
        .iter()
        .find(|r| path.contains(r.path))
        .map_or((404, r#"{"message":"Not Found"}"#), |r| {
            (r.status, r.body.as_str())
        });
    let reply = format!(
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let mut stream = reader.into_inner();
    let _ = stream.write_all(reply.as_bytes());
    let _ = stream.flush();
}

/// The binary pointed at the stub, with a config that never retries.
fn pushbutan(dir: &TempDir, port: u16) -> Command {
    let config = dir.path().join("config.yaml");
    std::fs::write(
        &config,
        format!(
            "api_url: http://127.0.0.1:{port}\nhttp:\n  max_attempts: 1\nlogs_dir: {}\n",
            dir.path().join("logs").display()
        ),
    )
    .expect("write config");
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pushbutan"));
    cmd.env("NO_COLOR", "1")
        .env("GITHUB_TOKEN", "test-token")
        .env_remove("RUST_LOG")
        .env("PUSHBUTAN_CONFIG", &config);
    cmd
}

fn run_item(id: u64, status: &str, conclusion: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "workflow_id": 31_526_128,
        "path": ".github/workflows/launch-dev-instance.yml",
        "created_at": "2026-10-19T10:00:00Z",
        "status": status,
        "conclusion": conclusion,
        "event": "workflow_dispatch",
        "head_branch": "main",
        "actor": { "login": "octocat" },
        "display_title": "Launch",
        "html_url": format!("https://github.com/o/r/actions/runs/{id}"),
    })
}

#[test]
fn test_status_of_running_job() {
    let port = serve(vec![route(
        "/actions/runs/42",
        200,
        run_item(42, "in_progress", None),
    )]);
    let dir = TempDir::new().unwrap();
    pushbutan(&dir, port)
        .args(["status", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Run 42: in_progress (conclusion: pending)",
        ));
}

#[test]
fn test_status_json_is_tagged_by_state() {
    let port = serve(vec![route(
        "/actions/runs/42",
        200,
        run_item(42, "in_progress", None),
    )]);
    let dir = TempDir::new().unwrap();
    let output = pushbutan(&dir, port)
        .args(["--json", "status", "42"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["status"], "in_progress");
    assert_eq!(json["workflow_status"], "in_progress");
    assert!(json["workflow_conclusion"].is_null());
}

#[test]
fn test_status_of_successful_job() {
    let port = serve(vec![route(
        "/actions/runs/7",
        200,
        run_item(7, "completed", Some("success")),
    )]);
    let dir = TempDir::new().unwrap();
    pushbutan(&dir, port)
        .args(["status", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow completed successfully"));
}

#[test]
fn test_status_of_failed_job_exits_one() {
    let port = serve(vec![route(
        "/actions/runs/9",
        200,
        run_item(9, "completed", Some("failure")),
    )]);
    let dir = TempDir::new().unwrap();
    pushbutan(&dir, port)
        .args(["status", "9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("conclusion: failure"));
}

#[test]
fn test_details_of_unfinished_run_is_refused() {
    let port = serve(vec![route(
        "/actions/runs/42",
        200,
        run_item(42, "queued", None),
    )]);
    let dir = TempDir::new().unwrap();
    pushbutan(&dir, port)
        .args(["details", "42"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("still"));
}

#[test]
fn test_list_shows_workflows() {
    let port = serve(vec![route(
        "/actions/workflows",
        200,
        serde_json::json!({
            "total_count": 2,
            "workflows": [
                {
                    "id": 31_526_128,
                    "name": "Launch dev instance",
                    "path": ".github/workflows/launch-dev-instance.yml",
                    "state": "active",
                },
                {
                    "id": 33_000_001,
                    "name": "Sign packages",
                    "path": ".github/workflows/sign.yml",
                    "state": "disabled_manually",
                },
            ],
        }),
    )]);
    let dir = TempDir::new().unwrap();
    pushbutan(&dir, port)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("Launch dev instance (ID: 31526128)"))
        .stdout(predicate::str::contains("Sign packages (ID: 33000001)"));
}

#[test]
fn test_list_json_passes_workflows_through() {
    let port = serve(vec![route(
        "/actions/workflows",
        200,
        serde_json::json!({
            "workflows": [
                { "id": 1, "name": "CI", "path": "ci.yml", "state": "active" },
            ],
        }),
    )]);
    let dir = TempDir::new().unwrap();
    let output = pushbutan(&dir, port)
        .args(["list", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json[0]["name"], "CI");
    assert_eq!(json[0]["state"], "active");
}

#[test]
fn test_bad_credentials_report_auth_code() {
    let port = serve(vec![route(
        "/actions/workflows",
        401,
        serde_json::json!({ "message": "Bad credentials" }),
    )]);
    let dir = TempDir::new().unwrap();
    let output = pushbutan(&dir, port)
        .args(["--json", "list"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["error"], true);
    assert_eq!(json["code"], "auth");
    assert!(json["message"].as_str().unwrap().contains("Bad credentials"));
}

#[test]
fn test_unknown_run_is_a_request_failure() {
    let port = serve(Vec::new());
    let dir = TempDir::new().unwrap();
    let output = pushbutan(&dir, port)
        .args(["--json", "status", "5"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(json["code"], "request_failed");
}
