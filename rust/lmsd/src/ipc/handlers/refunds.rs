use crate::auth::REFUND_MANAGE;
use crate::error::LmsResult;
use crate::ipc::helpers::{dispatch, optional_str, paging, required_str, Ctx, Handler};
use crate::ipc::types::{AppState, Request};
use crate::refunds;
use serde_json::{json, Value};

fn handle_request(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let order_id = required_str(ctx.params, "orderId")?;
    let reason = optional_str(ctx.params, "reason")?;
    Ok(json!({ "refund": refunds::request_refund(ctx.conn, order_id, reason)? }))
}

fn handle_approve(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let refund_id = required_str(ctx.params, "refundId")?;
    Ok(json!({ "refund": refunds::approve_refund(ctx.conn, refund_id)? }))
}

fn handle_reject(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let refund_id = required_str(ctx.params, "refundId")?;
    Ok(json!({ "refund": refunds::reject_refund(ctx.conn, refund_id)? }))
}

fn handle_list(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let status = optional_str(ctx.params, "status")?;
    let (limit, offset) = paging(ctx)?;
    Ok(json!({ "refunds": refunds::list_refunds(ctx.conn, status, limit, offset)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "refunds.request" => handle_request,
        "refunds.approve" => handle_approve,
        "refunds.reject" => handle_reject,
        "refunds.list" => handle_list,
        _ => return None,
    };
    Some(dispatch(state, req, Some(REFUND_MANAGE), handler))
}
