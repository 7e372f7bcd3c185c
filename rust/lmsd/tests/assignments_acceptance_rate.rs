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
    let exe = env!("CARGO_BIN_EXE_lmsd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn lmsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    actor: Option<&str>,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let mut payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    if let Some(actor) = actor {
        payload["actor"] = json!(actor);
    }
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
    actor: Option<&str>,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, actor, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value.get("error").cloned().unwrap_or_default()
    );
    value.get("result").cloned().unwrap_or_default()
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn open_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> String {
    let workspace = temp_dir(prefix);
    request_ok(
        stdin,
        reader,
        "ws",
        None,
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let boot = request_ok(
        stdin,
        reader,
        "boot",
        None,
        "auth.bootstrap",
        json!({ "name": "Root", "email": "root@example.com" }),
    );
    boot["userId"].as_str().expect("userId").to_string()
}

#[test]
fn acceptance_rate_rounds_to_two_decimals() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let admin = open_workspace(&mut stdin, &mut reader, "lmsd-assignments");
    let a = Some(admin.as_str());

    let course = request_ok(
        &mut stdin,
        &mut reader,
        "c",
        a,
        "courses.create",
        json!({ "title": "Writing" }),
    )["courseId"]
        .as_str()
        .expect("courseId")
        .to_string();
    let chapter = request_ok(
        &mut stdin,
        &mut reader,
        "ch",
        a,
        "chapters.create",
        json!({ "courseId": course, "title": "Essays" }),
    )["chapterId"]
        .as_str()
        .expect("chapterId")
        .to_string();
    let assignment = request_ok(
        &mut stdin,
        &mut reader,
        "a",
        a,
        "curriculum.addItem",
        json!({ "chapterId": chapter, "kind": "assignment", "title": "Essay 1" }),
    )["itemId"]
        .as_str()
        .expect("itemId")
        .to_string();

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "s0",
        a,
        "assignments.stats",
        json!({ "assignmentId": assignment }),
    );
    assert_eq!(empty["stats"]["total"], 0);
    assert_eq!(empty["stats"]["acceptanceRate"].as_f64(), Some(0.0));

    let mut submissions = Vec::new();
    for n in 0..3 {
        let user = request_ok(
            &mut stdin,
            &mut reader,
            &format!("u{}", n),
            a,
            "users.create",
            json!({ "name": format!("S{}", n), "email": format!("s{}@example.com", n) }),
        )["userId"]
            .as_str()
            .expect("userId")
            .to_string();
        let sub = request_ok(
            &mut stdin,
            &mut reader,
            &format!("sub{}", n),
            a,
            "assignments.submit",
            json!({ "assignmentId": assignment, "userId": user }),
        );
        submissions.push(sub["submission"]["id"].as_str().expect("id").to_string());
    }

    let graded = request_ok(
        &mut stdin,
        &mut reader,
        "g0",
        a,
        "assignments.grade",
        json!({ "submissionId": submissions[0], "status": "accepted", "grade": 88.5, "feedback": "solid" }),
    );
    assert_eq!(graded["submission"]["status"], "accepted");
    assert_eq!(graded["submission"]["feedback"], "solid");
    request_ok(
        &mut stdin,
        &mut reader,
        "g1",
        a,
        "assignments.grade",
        json!({ "submissionId": submissions[1], "status": "rejected" }),
    );
    let regrade = request(
        &mut stdin,
        &mut reader,
        "g1b",
        a,
        "assignments.grade",
        json!({ "submissionId": submissions[1], "status": "accepted" }),
    );
    assert_eq!(error_code(&regrade), "invalid_state");
    let bad_grade = request(
        &mut stdin,
        &mut reader,
        "g2",
        a,
        "assignments.grade",
        json!({ "submissionId": submissions[2], "status": "accepted", "grade": 140 }),
    );
    assert_eq!(error_code(&bad_grade), "bad_params");

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        a,
        "assignments.stats",
        json!({ "courseId": course }),
    );
    let s = &stats["stats"];
    assert_eq!(s["total"], 3);
    assert_eq!(s["accepted"], 1);
    assert_eq!(s["rejected"], 1);
    assert_eq!(s["pending"], 1);
    assert_eq!(s["acceptanceRate"].as_f64(), Some(33.33));

    request_ok(
        &mut stdin,
        &mut reader,
        "g3",
        a,
        "assignments.grade",
        json!({ "submissionId": submissions[2], "status": "accepted" }),
    );
    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "s2",
        a,
        "assignments.stats",
        json!({ "assignmentId": assignment }),
    );
    assert_eq!(stats["stats"]["acceptanceRate"].as_f64(), Some(66.67));

    drop(stdin);
    let _ = child.wait();
}
