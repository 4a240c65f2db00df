use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_schoolhubd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoolhubd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn evaluate(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    request_ok(stdin, reader, id, "guard.evaluate", params)
}

#[test]
fn guard_reports_loading_until_the_store_has_settled() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    // No workspace yet: restore cannot have run, so no redirect is allowed.
    let d = evaluate(
        &mut stdin,
        &mut reader,
        "1",
        json!({ "view": "/teacher", "requiredRole": "teacher" }),
    );
    assert_eq!(d.get("outcome").and_then(|v| v.as_str()), Some("loading"));
}

#[test]
fn unauthenticated_navigation_redirects_to_login_with_origin() {
    let workspace = temp_dir("schoolhub-guard-login");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    // Fails closed for every required role, and with none at all.
    for (i, required) in [None, Some("admin"), Some("teacher"), Some("student")]
        .iter()
        .enumerate()
    {
        let mut params = json!({ "view": "/courses" });
        if let Some(role) = required {
            params["requiredRole"] = json!(role);
        }
        let d = evaluate(&mut stdin, &mut reader, &format!("g{}", i), params);
        assert_eq!(d.get("outcome").and_then(|v| v.as_str()), Some("redirect"));
        assert_eq!(d.get("to").and_then(|v| v.as_str()), Some("/login"));
        assert_eq!(d.get("from").and_then(|v| v.as_str()), Some("/courses"));
    }

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn role_mismatch_goes_to_default_view_not_login() {
    let workspace = temp_dir("schoolhub-guard-roles");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.login",
        json!({ "email": "teacher@school.edu", "secret": "teacher123" }),
    );

    // Matching role renders.
    let d = evaluate(
        &mut stdin,
        &mut reader,
        "3",
        json!({ "view": "/teacher", "requiredRole": "teacher" }),
    );
    assert_eq!(d.get("outcome").and_then(|v| v.as_str()), Some("render"));

    // No directive renders for any authenticated session.
    let d = evaluate(&mut stdin, &mut reader, "4", json!({ "view": "/events" }));
    assert_eq!(d.get("outcome").and_then(|v| v.as_str()), Some("render"));

    // Mismatch: valid user, wrong role, neutral default view.
    let d = evaluate(
        &mut stdin,
        &mut reader,
        "5",
        json!({ "view": "/admin", "requiredRole": "admin" }),
    );
    assert_eq!(d.get("outcome").and_then(|v| v.as_str()), Some("redirect"));
    assert_eq!(d.get("to").and_then(|v| v.as_str()), Some("/"));

    // A directive naming a role outside the closed set also fails closed.
    let d = evaluate(
        &mut stdin,
        &mut reader,
        "6",
        json!({ "view": "/ops", "requiredRole": "superuser" }),
    );
    assert_eq!(d.get("outcome").and_then(|v| v.as_str()), Some("redirect"));
    assert_eq!(d.get("to").and_then(|v| v.as_str()), Some("/"));

    // After logout the same navigation is the unauthenticated case again.
    let _ = request_ok(&mut stdin, &mut reader, "7", "auth.logout", json!({}));
    let d = evaluate(
        &mut stdin,
        &mut reader,
        "8",
        json!({ "view": "/teacher", "requiredRole": "teacher" }),
    );
    assert_eq!(d.get("to").and_then(|v| v.as_str()), Some("/login"));

    let _ = std::fs::remove_dir_all(workspace);
}
