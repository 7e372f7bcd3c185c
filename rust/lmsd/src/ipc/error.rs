use crate::error::LmsError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Envelope for a domain error. Storage failures are logged with their full
/// text here; the client only sees the sanitized message.
pub fn lms_err(id: &str, method: &str, e: &LmsError) -> serde_json::Value {
    match e {
        LmsError::Db(_) | LmsError::Settings(_) => {
            tracing::error!(id, method, error = %e, "storage failure");
        }
        _ => {
            tracing::warn!(id, method, code = e.code(), message = %e, "request failed");
        }
    }
    err(id, e.code(), e.public_message(), e.details())
}
