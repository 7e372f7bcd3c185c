use crate::auth::COURSE_MANAGE;
use crate::curriculum;
use crate::error::LmsResult;
use crate::ipc::handlers::courses::parse_kind;
use crate::ipc::helpers::{dispatch, required_str, Ctx, Handler};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_complete(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let kind = parse_kind(ctx)?;
    let item_id = required_str(ctx.params, "itemId")?;
    let newly_completed = curriculum::complete_item(ctx.conn, user_id, kind, item_id)?;
    Ok(json!({ "newlyCompleted": newly_completed }))
}

fn handle_reset(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let course_id = required_str(ctx.params, "courseId")?;
    let removed = curriculum::reset_tracking(ctx.conn, user_id, course_id)?;
    tracing::info!(user_id, course_id, removed, "tracking reset");
    Ok(json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "tracking.complete" => handle_complete,
        "tracking.reset" => handle_reset,
        _ => return None,
    };
    Some(dispatch(state, req, Some(COURSE_MANAGE), handler))
}
