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
fn signup_mints_a_teacher_with_an_optional_starter_task() {
    let workspace = temp_dir("apexedu-signup");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let signup = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.signup",
        json!({
            "email": "nadia@apex.edu",
            "password": "s3cret",
            "name": "Nadia Okafor",
            "phone": "+1 (555) 678-9012",
            "firstTask": { "title": "Lesson Plan Prep", "description": "Week one outline." }
        }),
    );

    let user = signup.get("user").expect("user");
    assert_eq!(user.get("role").and_then(|v| v.as_str()), Some("TEACHER"));
    assert_eq!(
        user.get("department").and_then(|v| v.as_str()),
        Some("Science")
    );
    let avatar = user.get("avatar").and_then(|v| v.as_str()).expect("avatar");
    assert!(avatar.contains("dicebear"), "placeholder avatar: {}", avatar);
    let new_id = user.get("id").and_then(|v| v.as_str()).expect("id").to_string();

    let starter = signup.get("firstTask").expect("starter task");
    assert_eq!(
        starter.get("assignedTeacherId").and_then(|v| v.as_str()),
        Some(new_id.as_str())
    );
    assert_eq!(starter.get("status").and_then(|v| v.as_str()), Some("TODO"));
    assert_eq!(
        starter.get("priority").and_then(|v| v.as_str()),
        Some("MEDIUM")
    );
    assert_eq!(starter.get("progress").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(
        starter.get("subject").and_then(|v| v.as_str()),
        Some("General")
    );

    // The signup doubles as a login: the new teacher's listing is exactly
    // their starter task.
    let tasks = request_ok(&mut stdin, &mut reader, "3", "tasks.list", json!({}));
    let rows = tasks.get("tasks").and_then(|v| v.as_array()).expect("tasks");
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("title").and_then(|v| v.as_str()),
        Some("Lesson Plan Prep")
    );

    // Seeded addresses are taken.
    assert_eq!(
        request_err_code(
            &mut stdin,
            &mut reader,
            "4",
            "auth.signup",
            json!({ "email": "david@apex.edu", "password": "x", "name": "Imposter" }),
        ),
        "email_in_use"
    );
}
