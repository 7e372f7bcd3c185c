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
fn four_item_course_half_done_is_in_progress() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let admin = open_workspace(&mut stdin, &mut reader, "lmsd-progress-half");
    let a = Some(admin.as_str());

    let user = request_ok(
        &mut stdin,
        &mut reader,
        "u",
        a,
        "users.create",
        json!({ "name": "Learner", "email": "learner@example.com" }),
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
        json!({ "title": "Rust Basics", "priceCents": 5000 }),
    )["courseId"]
        .as_str()
        .expect("courseId")
        .to_string();
    let ch1 = request_ok(
        &mut stdin,
        &mut reader,
        "ch1",
        a,
        "chapters.create",
        json!({ "courseId": course, "title": "Ownership" }),
    )["chapterId"]
        .as_str()
        .expect("chapterId")
        .to_string();
    let ch2 = request_ok(
        &mut stdin,
        &mut reader,
        "ch2",
        a,
        "chapters.create",
        json!({ "courseId": course, "title": "Traits" }),
    )["chapterId"]
        .as_str()
        .expect("chapterId")
        .to_string();

    let mut items = Vec::new();
    for (n, (chapter, kind)) in [
        (&ch1, "lecture"),
        (&ch1, "lecture"),
        (&ch2, "quiz"),
        (&ch2, "assignment"),
    ]
    .into_iter()
    .enumerate()
    {
        let added = request_ok(
            &mut stdin,
            &mut reader,
            &format!("item{}", n),
            a,
            "curriculum.addItem",
            json!({ "chapterId": chapter, "kind": kind, "title": format!("Item {}", n) }),
        );
        items.push((kind, added["itemId"].as_str().expect("itemId").to_string()));
    }

    let before = request_ok(
        &mut stdin,
        &mut reader,
        "p0",
        a,
        "progress.course",
        json!({ "userId": user, "courseId": course }),
    );
    assert_eq!(before["progress"]["status"], "not_started");
    assert_eq!(before["progress"]["totalItems"], 4);
    assert!(before["progress"]["firstTrackingDate"].is_null());

    // Both lectures of chapter one.
    for (n, (kind, item_id)) in items.iter().take(2).enumerate() {
        let done = request_ok(
            &mut stdin,
            &mut reader,
            &format!("t{}", n),
            a,
            "tracking.complete",
            json!({ "userId": user, "kind": kind, "itemId": item_id }),
        );
        assert_eq!(done["newlyCompleted"], true);
    }
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "t-again",
        a,
        "tracking.complete",
        json!({ "userId": user, "kind": items[0].0, "itemId": items[0].1 }),
    );
    assert_eq!(again["newlyCompleted"], false);

    let half = request_ok(
        &mut stdin,
        &mut reader,
        "p1",
        a,
        "progress.course",
        json!({ "userId": user, "courseId": course }),
    );
    assert_eq!(half["progress"]["progressPercentage"].as_f64(), Some(50.0));
    assert_eq!(half["progress"]["status"], "in_progress");
    assert_eq!(half["progress"]["completedItems"], 2);
    assert!(half["progress"]["firstTrackingDate"].is_string());

    let chapters = request_ok(
        &mut stdin,
        &mut reader,
        "pc",
        a,
        "progress.chapters",
        json!({ "userId": user, "courseId": course }),
    );
    let rows = chapters["chapters"].as_array().expect("chapters");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["chapterId"], ch1.as_str());
    assert_eq!(rows[0]["status"], "completed");
    assert_eq!(rows[1]["status"], "not_started");

    // Quiz only: chapter two is partially done.
    request_ok(
        &mut stdin,
        &mut reader,
        "t2",
        a,
        "tracking.complete",
        json!({ "userId": user, "kind": items[2].0, "itemId": items[2].1 }),
    );
    let chapters = request_ok(
        &mut stdin,
        &mut reader,
        "pc2",
        a,
        "progress.chapters",
        json!({ "userId": user, "courseId": course }),
    );
    assert_eq!(chapters["chapters"][1]["status"], "in_progress");
    assert_eq!(chapters["chapters"][1]["progressPercentage"].as_f64(), Some(50.0));

    request_ok(
        &mut stdin,
        &mut reader,
        "t3",
        a,
        "tracking.complete",
        json!({ "userId": user, "kind": items[3].0, "itemId": items[3].1 }),
    );
    let full = request_ok(
        &mut stdin,
        &mut reader,
        "p2",
        a,
        "progress.course",
        json!({ "userId": user, "courseId": course }),
    );
    assert_eq!(full["progress"]["progressPercentage"].as_f64(), Some(100.0));
    assert_eq!(full["progress"]["status"], "completed");

    // Removing a completed item drops it from numerator and denominator alike.
    request_ok(
        &mut stdin,
        &mut reader,
        "rm",
        a,
        "curriculum.removeItem",
        json!({ "kind": items[3].0, "itemId": items[3].1 }),
    );
    let after_remove = request_ok(
        &mut stdin,
        &mut reader,
        "p3",
        a,
        "progress.course",
        json!({ "userId": user, "courseId": course }),
    );
    assert_eq!(after_remove["progress"]["totalItems"], 3);
    assert_eq!(after_remove["progress"]["status"], "completed");

    let reset = request_ok(
        &mut stdin,
        &mut reader,
        "reset",
        a,
        "tracking.reset",
        json!({ "userId": user, "courseId": course }),
    );
    assert_eq!(reset["removed"], 3);
    let cleared = request_ok(
        &mut stdin,
        &mut reader,
        "p4",
        a,
        "progress.course",
        json!({ "userId": user, "courseId": course }),
    );
    assert_eq!(cleared["progress"]["status"], "not_started");
    assert_eq!(cleared["progress"]["progressPercentage"].as_f64(), Some(0.0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn empty_and_missing_courses_degrade_to_not_started() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let admin = open_workspace(&mut stdin, &mut reader, "lmsd-progress-empty");
    let a = Some(admin.as_str());

    let user = request_ok(
        &mut stdin,
        &mut reader,
        "u",
        a,
        "users.create",
        json!({ "name": "Learner", "email": "learner@example.com" }),
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
        json!({ "title": "Empty" }),
    )["courseId"]
        .as_str()
        .expect("courseId")
        .to_string();
    request_ok(
        &mut stdin,
        &mut reader,
        "ch",
        a,
        "chapters.create",
        json!({ "courseId": course, "title": "Nothing here" }),
    );

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "p-empty",
        a,
        "progress.course",
        json!({ "userId": user, "courseId": course }),
    );
    assert_eq!(empty["progress"]["progressPercentage"].as_f64(), Some(0.0));
    assert_eq!(empty["progress"]["status"], "not_started");
    assert_eq!(empty["progress"]["totalItems"], 0);
    assert_eq!(empty["progress"]["courseFound"], true);

    let missing = request_ok(
        &mut stdin,
        &mut reader,
        "p-missing",
        a,
        "progress.course",
        json!({ "userId": user, "courseId": "no-such-course" }),
    );
    assert_eq!(missing["progress"]["status"], "not_started");
    assert_eq!(missing["progress"]["courseFound"], false);

    let no_chapters = request_ok(
        &mut stdin,
        &mut reader,
        "pc-missing",
        a,
        "progress.chapters",
        json!({ "userId": user, "courseId": "no-such-course" }),
    );
    assert_eq!(no_chapters["chapters"].as_array().map(|v| v.len()), Some(0));

    drop(stdin);
    let _ = child.wait();
}
