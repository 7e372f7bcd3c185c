use crate::auth::CERTIFICATE_MANAGE;
use crate::certificates;
use crate::error::LmsResult;
use crate::ipc::helpers::{dispatch, required_str, Ctx};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_issue(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let course_id = required_str(ctx.params, "courseId")?;
    let (certificate, created) = certificates::issue(
        ctx.conn,
        &ctx.config.certificate_prefix,
        user_id,
        course_id,
    )?;
    Ok(json!({ "certificate": certificate, "created": created }))
}

fn handle_verify(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let code = required_str(ctx.params, "code")?;
    Ok(json!({ "verification": certificates::verify(ctx.conn, code)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "certificates.issue" => Some(dispatch(state, req, Some(CERTIFICATE_MANAGE), handle_issue)),
        // Verification is public: anyone holding a code may check it.
        "certificates.verify" => Some(dispatch(state, req, None, handle_verify)),
        _ => None,
    }
}
