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
fn rejected_withdrawal_credits_exactly_once() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let admin = open_workspace(&mut stdin, &mut reader, "lmsd-withdrawals");
    let a = Some(admin.as_str());

    let user = request_ok(
        &mut stdin,
        &mut reader,
        "u",
        a,
        "users.create",
        json!({ "name": "Instructor", "email": "teach@example.com", "role": "instructor" }),
    )["userId"]
        .as_str()
        .expect("userId")
        .to_string();

    let funded = request_ok(
        &mut stdin,
        &mut reader,
        "fund",
        a,
        "wallet.adjust",
        json!({ "userId": user, "amountCents": 10000, "direction": "credit", "note": "earnings" }),
    );
    assert_eq!(funded["balanceCents"], 10000);

    let too_small = request(
        &mut stdin,
        &mut reader,
        "small",
        a,
        "withdrawals.request",
        json!({ "userId": user, "amountCents": 500 }),
    );
    assert_eq!(error_code(&too_small), "bad_params");

    let too_big = request(
        &mut stdin,
        &mut reader,
        "big",
        a,
        "withdrawals.request",
        json!({ "userId": user, "amountCents": 20000 }),
    );
    assert_eq!(error_code(&too_big), "insufficient_funds");
    assert_eq!(too_big["error"]["details"]["balanceCents"], 10000);

    let requested = request_ok(
        &mut stdin,
        &mut reader,
        "req",
        a,
        "withdrawals.request",
        json!({ "userId": user, "amountCents": 4000 }),
    );
    let withdrawal_id = requested["withdrawal"]["id"]
        .as_str()
        .expect("withdrawal id")
        .to_string();
    assert_eq!(requested["withdrawal"]["status"], "pending");

    let held = request_ok(
        &mut stdin,
        &mut reader,
        "w1",
        a,
        "wallet.get",
        json!({ "userId": user }),
    );
    assert_eq!(held["balanceCents"], 6000);
    let debit = held["transactions"]
        .as_array()
        .expect("transactions")
        .iter()
        .find(|t| t["direction"] == "debit")
        .expect("debit row")
        .clone();
    assert_eq!(debit["entryType"], "user");
    assert_eq!(debit["amountCents"], 4000);

    let rejected = request_ok(
        &mut stdin,
        &mut reader,
        "rej",
        a,
        "withdrawals.reject",
        json!({ "withdrawalId": withdrawal_id, "note": "bank details invalid" }),
    );
    assert_eq!(rejected["withdrawal"]["status"], "rejected");

    let again = request(
        &mut stdin,
        &mut reader,
        "rej2",
        a,
        "withdrawals.reject",
        json!({ "withdrawalId": withdrawal_id }),
    );
    assert_eq!(again["ok"], false);
    assert_eq!(error_code(&again), "invalid_state");

    let approve_after = request(
        &mut stdin,
        &mut reader,
        "appr",
        a,
        "withdrawals.approve",
        json!({ "withdrawalId": withdrawal_id }),
    );
    assert_eq!(error_code(&approve_after), "invalid_state");

    let restored = request_ok(
        &mut stdin,
        &mut reader,
        "w2",
        a,
        "wallet.get",
        json!({ "userId": user }),
    );
    assert_eq!(restored["balanceCents"], 10000);
    let refund_credits = restored["transactions"]
        .as_array()
        .expect("transactions")
        .iter()
        .filter(|t| t["referenceId"] == withdrawal_id.as_str() && t["direction"] == "credit")
        .count();
    assert_eq!(refund_credits, 1);

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "list",
        a,
        "withdrawals.list",
        json!({ "status": "rejected" }),
    );
    assert_eq!(listed["withdrawals"].as_array().map(|v| v.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn approved_withdrawal_keeps_funds_debited() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let admin = open_workspace(&mut stdin, &mut reader, "lmsd-withdrawals-approve");
    let a = Some(admin.as_str());

    let user = request_ok(
        &mut stdin,
        &mut reader,
        "u",
        a,
        "users.create",
        json!({ "name": "Affiliate", "email": "aff@example.com" }),
    )["userId"]
        .as_str()
        .expect("userId")
        .to_string();
    request_ok(
        &mut stdin,
        &mut reader,
        "fund",
        a,
        "wallet.adjust",
        json!({ "userId": user, "amountCents": 2500, "direction": "credit" }),
    );
    let w = request_ok(
        &mut stdin,
        &mut reader,
        "req",
        a,
        "withdrawals.request",
        json!({ "userId": user, "amountCents": 2500 }),
    );
    let id = w["withdrawal"]["id"].as_str().expect("id").to_string();
    let approved = request_ok(
        &mut stdin,
        &mut reader,
        "appr",
        a,
        "withdrawals.approve",
        json!({ "withdrawalId": id }),
    );
    assert_eq!(approved["withdrawal"]["status"], "approved");
    let reject_after = request(
        &mut stdin,
        &mut reader,
        "rej",
        a,
        "withdrawals.reject",
        json!({ "withdrawalId": id }),
    );
    assert_eq!(error_code(&reject_after), "invalid_state");

    let wallet = request_ok(
        &mut stdin,
        &mut reader,
        "w",
        a,
        "wallet.get",
        json!({ "userId": user }),
    );
    assert_eq!(wallet["balanceCents"], 0);

    drop(stdin);
    let _ = child.wait();
}
