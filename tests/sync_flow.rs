//! End-to-end sync flow against a canned-response HTTP server.
//!
//! The mock serves both the "source" and the "target" workspace on one
//! socket; requests are told apart by their bearer token. No mock-server
//! crate: a plain `TcpListener` thread answering one request per
//! connection is all the sequential client needs.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    /// Path plus query string, as sent on the request line.
    target: String,
    authorization: String,
    body: String,
}

struct MockWorkspace {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockWorkspace {
    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn spawn_mock_workspace(fail_import: bool) -> MockWorkspace {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock workspace");
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let Some(request) = read_request(&mut stream) else {
                continue;
            };
            let (status, body) = route(&request, fail_import);
            recorded.lock().unwrap().push(request);
            let reason = match status {
                200 => "OK",
                404 => "Not Found",
                _ => "Internal Server Error",
            };
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });

    MockWorkspace { addr, requests }
}

fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut line = String::new();
    reader.read_line(&mut line).ok()?;
    let mut parts = line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut content_length = 0usize;
    let mut authorization = String::new();
    loop {
        let mut header = String::new();
        reader.read_line(&mut header).ok()?;
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            match name.to_ascii_lowercase().as_str() {
                "content-length" => content_length = value.trim().parse().unwrap_or(0),
                "authorization" => authorization = value.trim().to_string(),
                _ => {}
            }
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).ok()?;
    }

    Some(RecordedRequest {
        method,
        target,
        authorization,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

/// Canned workspace: one notebook `/a` (source `print(1)`) and one
/// directory `/d` under the synced directory, whose ACL grants alice
/// CAN_MANAGE via the nested response shape.
fn route(request: &RecordedRequest, fail_import: bool) -> (u16, String) {
    let mut pieces = request.target.splitn(2, '?');
    let path = pieces.next().unwrap_or("");
    let query = pieces.next().unwrap_or("");

    match path {
        "/api/2.0/workspace/list" => (
            200,
            json!({
                "objects": [
                    {"path": "/a", "object_type": "NOTEBOOK"},
                    {"path": "/d", "object_type": "DIRECTORY"}
                ]
            })
            .to_string(),
        ),
        "/api/2.0/workspace/export" => {
            // base64("print(1)")
            (200, json!({"content": "cHJpbnQoMSk="}).to_string())
        }
        "/api/2.0/workspace/get-status" => {
            if query.contains("path=%2Fa") {
                (200, json!({"object_id": 7, "object_type": "NOTEBOOK"}).to_string())
            } else {
                (200, json!({"object_id": 42, "object_type": "DIRECTORY"}).to_string())
            }
        }
        "/api/2.0/permissions/directories/42" => (
            200,
            json!({
                "access_control_list": [
                    {"user_name": "alice", "all_permissions": [{"permission_level": "CAN_MANAGE"}]}
                ]
            })
            .to_string(),
        ),
        "/api/2.0/permissions/notebooks/7" => (200, "{}".to_string()),
        "/api/2.0/workspace/import" => {
            if fail_import {
                (500, "{}".to_string())
            } else {
                (200, "{}".to_string())
            }
        }
        _ => (404, "{}".to_string()),
    }
}

fn sync_cmd(server: &MockWorkspace) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("nbsync"));
    cmd.env("GCP_WORKSPACE_URL", server.url())
        .env("GCP_ACCESS_TOKEN", "source-token")
        .env("AZURE_WORKSPACE_URL", server.url())
        .env("AZURE_ACCESS_TOKEN", "target-token")
        .env("NOTEBOOK_DIR", "/Shared/team")
        .args(["--source", "gcp", "--target", "azure"]);
    cmd
}

#[test]
fn syncs_notebook_and_replays_permissions() {
    let server = spawn_mock_workspace(false);

    let mut cmd = sync_cmd(&server);
    cmd.args(["--git-url", "", "--cluster-id", "c-123"]);
    cmd.assert()
        .success()
        .stdout(contains("Permissions in GCP workspace:"))
        .stdout(contains("- alice: CAN_MANAGE"))
        .stdout(contains("Notebook imported successfully to /a in AZURE"))
        .stdout(contains("Granted CAN_MANAGE permissions to alice for /a"))
        .stdout(contains(
            "Granted CAN_ATTACH_TO permissions to alice for cluster c-123",
        ))
        .stdout(contains(
            "Notebook synchronization and permission sync completed.",
        ));

    let requests = server.requests();

    let export = requests
        .iter()
        .find(|r| r.target.starts_with("/api/2.0/workspace/export"))
        .expect("export request");
    assert_eq!(export.method, "GET");
    assert_eq!(export.authorization, "Bearer source-token");
    assert!(export.target.contains("format=SOURCE"));

    let import = requests
        .iter()
        .find(|r| r.target.starts_with("/api/2.0/workspace/import"))
        .expect("import request");
    assert_eq!(import.method, "POST");
    assert_eq!(import.authorization, "Bearer target-token");
    let body: Value = serde_json::from_str(&import.body).unwrap();
    assert_eq!(body["path"], "/a");
    assert_eq!(body["format"], "SOURCE");
    assert_eq!(body["language"], "PYTHON");
    assert_eq!(body["content"], "cHJpbnQoMSk=");
    assert_eq!(body["overwrite"], true);

    let grant = requests
        .iter()
        .find(|r| r.target == "/api/2.0/permissions/notebooks/7")
        .expect("grant request");
    // Non-managed URL (no public-domain substring) takes the PUT path.
    assert_eq!(grant.method, "PUT");
    assert_eq!(grant.authorization, "Bearer target-token");
    let body: Value = serde_json::from_str(&grant.body).unwrap();
    let acl = body["access_control_list"].as_array().unwrap();
    assert_eq!(acl.len(), 2);
    assert_eq!(acl[0]["user_name"], "alice");
    assert_eq!(acl[0]["permission_level"], "CAN_MANAGE");
    assert_eq!(acl[1]["user_name"], "alice");
    assert_eq!(acl[1]["permission_level"], "CAN_ATTACH_TO");
    assert_eq!(acl[1]["cluster_id"], "c-123");

    // The directory object was never exported.
    assert!(!requests
        .iter()
        .any(|r| r.target.starts_with("/api/2.0/workspace/export") && r.target.contains("%2Fd")));
}

#[test]
fn grant_without_cluster_id_sends_single_entry() {
    let server = spawn_mock_workspace(false);

    let mut cmd = sync_cmd(&server);
    cmd.args(["--git-url", "", "--cluster-id", ""]);
    cmd.assert().success();

    let requests = server.requests();
    let grant = requests
        .iter()
        .find(|r| r.target == "/api/2.0/permissions/notebooks/7")
        .expect("grant request");
    let body: Value = serde_json::from_str(&grant.body).unwrap();
    let acl = body["access_control_list"].as_array().unwrap();
    assert_eq!(acl.len(), 1);
    assert!(acl[0].get("cluster_id").is_none());
}

#[test]
fn import_failure_does_not_abort_the_run() {
    let server = spawn_mock_workspace(true);

    let mut cmd = sync_cmd(&server);
    cmd.args(["--git-url", "", "--cluster-id", ""]);
    cmd.assert().success().stdout(contains(
        "Notebook synchronization and permission sync completed.",
    ));

    // Import is fire-and-forget: the permission replay still ran.
    assert!(server
        .requests()
        .iter()
        .any(|r| r.target == "/api/2.0/permissions/notebooks/7"));
}

#[test]
fn git_clone_failure_aborts_before_any_api_call() {
    if which::which("git").is_err() {
        return;
    }
    let server = spawn_mock_workspace(false);
    let tmp = tempfile::tempdir().unwrap();
    let seed_dir = tmp.path().join("seed");

    let mut cmd = sync_cmd(&server);
    cmd.env("NOTEBOOK_DIR", seed_dir.to_str().unwrap());
    cmd.args(["--git-url", "/definitely/not/a/repo", "--cluster-id", ""]);
    cmd.assert()
        .failure()
        .stdout(contains("Error pulling notebooks from Git"))
        .stdout(contains("ensure you have the correct access rights"));

    assert!(server.requests().is_empty());
}
