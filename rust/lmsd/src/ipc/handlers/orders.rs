use crate::auth::COURSE_MANAGE;
use crate::currency;
use crate::error::LmsResult;
use crate::ipc::helpers::{dispatch, optional_str, required_str, string_list, Ctx, Handler};
use crate::ipc::types::{AppState, Request};
use crate::orders;
use serde_json::{json, Value};

fn handle_create(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let course_ids = string_list(ctx.params, "courseIds")?;
    let default_code = ctx.config.default_currency.as_str();
    let code = currency::normalize_code(optional_str(ctx.params, "currency")?.unwrap_or(default_code))?;
    let rate = currency::rate_for(ctx.conn, &code, default_code)?;
    let summary = orders::create_order(ctx.conn, user_id, &course_ids, &code, rate)?;
    Ok(json!({ "order": summary }))
}

fn handle_complete(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let order_id = required_str(ctx.params, "orderId")?;
    orders::complete_order(ctx.conn, order_id)?;
    Ok(json!({ "ok": true }))
}

fn handle_cancel(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let order_id = required_str(ctx.params, "orderId")?;
    orders::cancel_order(ctx.conn, order_id)?;
    Ok(json!({ "ok": true }))
}

fn handle_enrollments(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let course_id = optional_str(ctx.params, "courseId")?;
    Ok(json!({ "enrollments": orders::list_enrollments(ctx.conn, course_id)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "orders.create" => handle_create,
        "orders.complete" => handle_complete,
        "orders.cancel" => handle_cancel,
        "enrollments.list" => handle_enrollments,
        _ => return None,
    };
    Some(dispatch(state, req, Some(COURSE_MANAGE), handler))
}
