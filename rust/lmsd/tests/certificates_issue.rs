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
fn certificate_requires_full_progress_and_verifies() {
    let workspace = temp_dir("lmsd-certificates");
    std::fs::write(
        workspace.join("lmsd.toml"),
        "certificate_prefix = \"ACAD\"\n",
    )
    .expect("write config");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let selected = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        None,
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["config"]["certificate_prefix"], "ACAD");
    let admin = request_ok(
        &mut stdin,
        &mut reader,
        "boot",
        None,
        "auth.bootstrap",
        json!({ "name": "Root", "email": "root@example.com" }),
    )["userId"]
        .as_str()
        .expect("userId")
        .to_string();
    let a = Some(admin.as_str());

    let user = request_ok(
        &mut stdin,
        &mut reader,
        "u",
        a,
        "users.create",
        json!({ "name": "Grad", "email": "grad@example.com" }),
    )["userId"]
        .as_str()
        .expect("userId")
        .to_string();
    let course = request_ok(
        &mut stdin,
        &mut reader,
        "c",
        a,
        "courses.create",
        json!({ "title": "Security" }),
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
        json!({ "courseId": course, "title": "Crypto" }),
    )["chapterId"]
        .as_str()
        .expect("chapterId")
        .to_string();
    let mut items = Vec::new();
    for (n, kind) in ["lecture", "resource", "quiz"].into_iter().enumerate() {
        let id = request_ok(
            &mut stdin,
            &mut reader,
            &format!("i{}", n),
            a,
            "curriculum.addItem",
            json!({ "chapterId": chapter, "kind": kind, "title": kind }),
        )["itemId"]
            .as_str()
            .expect("itemId")
            .to_string();
        items.push((kind, id));
    }

    request_ok(
        &mut stdin,
        &mut reader,
        "t0",
        a,
        "tracking.complete",
        json!({ "userId": user, "kind": items[0].0, "itemId": items[0].1 }),
    );
    let early = request(
        &mut stdin,
        &mut reader,
        "early",
        a,
        "certificates.issue",
        json!({ "userId": user, "courseId": course }),
    );
    assert_eq!(error_code(&early), "not_completed");
    assert_eq!(
        early["error"]["details"]["progressPercentage"].as_f64(),
        Some(33.33)
    );

    for (n, (kind, id)) in items.iter().enumerate().skip(1) {
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("t{}", n),
            a,
            "tracking.complete",
            json!({ "userId": user, "kind": kind, "itemId": id }),
        );
    }
    let issued = request_ok(
        &mut stdin,
        &mut reader,
        "issue",
        a,
        "certificates.issue",
        json!({ "userId": user, "courseId": course }),
    );
    assert_eq!(issued["created"], true);
    let code = issued["certificate"]["code"].as_str().expect("code").to_string();
    assert!(code.starts_with("ACAD-"), "code {}", code);
    assert_eq!(code.len(), "ACAD-".len() + 16);

    let reissued = request_ok(
        &mut stdin,
        &mut reader,
        "issue2",
        a,
        "certificates.issue",
        json!({ "userId": user, "courseId": course }),
    );
    assert_eq!(reissued["created"], false);
    assert_eq!(reissued["certificate"]["code"], code.as_str());

    // Verification needs no actor.
    let verified = request_ok(
        &mut stdin,
        &mut reader,
        "verify",
        None,
        "certificates.verify",
        json!({ "code": code }),
    );
    assert_eq!(verified["verification"]["valid"], true);
    assert_eq!(verified["verification"]["userName"], "Grad");
    assert_eq!(verified["verification"]["courseTitle"], "Security");

    let bogus = request_ok(
        &mut stdin,
        &mut reader,
        "verify2",
        None,
        "certificates.verify",
        json!({ "code": "ACAD-FFFFFFFFFFFFFFFF" }),
    );
    assert_eq!(bogus["verification"]["valid"], false);

    drop(stdin);
    let _ = child.wait();
}
