use crate::auth::WITHDRAWAL_MANAGE;
use crate::error::{LmsError, LmsResult};
use crate::ipc::helpers::{
    dispatch, optional_str, paging, required_i64, required_str, Ctx, Handler,
};
use crate::ipc::types::{AppState, Request};
use crate::wallet::{self, Direction};
use serde_json::{json, Value};

fn handle_get(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let (limit, offset) = paging(ctx)?;
    let balance = wallet::balance(ctx.conn, user_id)?;
    let entries = wallet::ledger(ctx.conn, user_id, limit, offset)?;
    Ok(json!({
        "userId": user_id,
        "balanceCents": balance,
        "transactions": entries
    }))
}

fn handle_adjust(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let amount_cents = required_i64(ctx.params, "amountCents")?;
    let direction = match required_str(ctx.params, "direction")? {
        "credit" => Direction::Credit,
        "debit" => Direction::Debit,
        _ => return Err(LmsError::bad_params("direction must be credit or debit")),
    };
    let note = optional_str(ctx.params, "note")?;
    let balance = wallet::adjust(ctx.conn, user_id, amount_cents, direction, note)?;
    tracing::info!(actor = ?ctx.actor, user_id, amount_cents, direction = direction.as_str(), "wallet adjusted");
    Ok(json!({ "balanceCents": balance }))
}

fn handle_request(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let amount_cents = required_i64(ctx.params, "amountCents")?;
    let note = optional_str(ctx.params, "note")?;
    let w = wallet::request_withdrawal(
        ctx.conn,
        user_id,
        amount_cents,
        ctx.config.min_withdrawal_cents,
        note,
    )?;
    Ok(json!({ "withdrawal": w }))
}

fn handle_approve(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let withdrawal_id = required_str(ctx.params, "withdrawalId")?;
    Ok(json!({ "withdrawal": wallet::approve_withdrawal(ctx.conn, withdrawal_id)? }))
}

fn handle_reject(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let withdrawal_id = required_str(ctx.params, "withdrawalId")?;
    let note = optional_str(ctx.params, "note")?;
    Ok(json!({ "withdrawal": wallet::reject_withdrawal(ctx.conn, withdrawal_id, note)? }))
}

fn handle_list(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let status = optional_str(ctx.params, "status")?;
    let (limit, offset) = paging(ctx)?;
    Ok(json!({ "withdrawals": wallet::list_withdrawals(ctx.conn, status, limit, offset)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "wallet.get" => handle_get,
        "wallet.adjust" => handle_adjust,
        "withdrawals.request" => handle_request,
        "withdrawals.approve" => handle_approve,
        "withdrawals.reject" => handle_reject,
        "withdrawals.list" => handle_list,
        _ => return None,
    };
    Some(dispatch(state, req, Some(WITHDRAWAL_MANAGE), handler))
}
