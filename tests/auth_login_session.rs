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
    let exe = env!("CARGO_BIN_EXE_apexedud");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn apexedud");
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

fn request_err_code(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
        .expect("error code")
        .to_string()
}

#[test]
fn login_checks_exact_credentials_and_session_survives_restart() {
    let workspace = temp_dir("apexedu-auth-session");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    // Fresh store: nothing to restore, the UI shows login.
    assert!(selected.get("currentUser").map(|v| v.is_null()).unwrap_or(false));

    // Wrong password and unknown email fail the same way.
    assert_eq!(
        request_err_code(
            &mut stdin,
            &mut reader,
            "2",
            "auth.login",
            json!({ "email": "sarah@apex.edu", "password": "nope" }),
        ),
        "invalid_credentials"
    );
    assert_eq!(
        request_err_code(
            &mut stdin,
            &mut reader,
            "3",
            "auth.login",
            json!({ "email": "nobody@apex.edu", "password": "apex123" }),
        ),
        "invalid_credentials"
    );

    // Before login, data reads are refused at the boundary.
    assert_eq!(
        request_err_code(&mut stdin, &mut reader, "4", "tasks.list", json!({})),
        "no_session"
    );

    let login = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "auth.login",
        json!({ "email": "sarah@apex.edu", "password": "apex123" }),
    );
    assert_eq!(
        login.get("user").and_then(|u| u.get("role")).and_then(|r| r.as_str()),
        Some("ADMIN")
    );

    // The logged-in user object is the session: a fresh process restores it
    // without re-validating anything.
    let (_child2, mut stdin2, mut reader2) = spawn_sidecar();
    let restored = request_ok(
        &mut stdin2,
        &mut reader2,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(
        restored
            .get("currentUser")
            .and_then(|u| u.get("id"))
            .and_then(|v| v.as_str()),
        Some("u1")
    );

    // Logout clears the persisted session and resets navigation.
    let out = request_ok(&mut stdin2, &mut reader2, "2", "auth.logout", json!({}));
    let view = out.get("view").expect("view snapshot");
    assert!(view.get("currentUser").map(|v| v.is_null()).unwrap_or(false));
    assert_eq!(
        view.get("currentView").and_then(|v| v.as_str()),
        Some("dashboard")
    );

    let (_child3, mut stdin3, mut reader3) = spawn_sidecar();
    let after_logout = request_ok(
        &mut stdin3,
        &mut reader3,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert!(after_logout
        .get("currentUser")
        .map(|v| v.is_null())
        .unwrap_or(false));
}
