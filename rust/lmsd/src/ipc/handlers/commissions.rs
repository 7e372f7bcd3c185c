use crate::auth::COMMISSION_MANAGE;
use crate::commissions;
use crate::error::LmsResult;
use crate::ipc::helpers::{dispatch, optional_i64, optional_str, required_str, Ctx, Handler};
use crate::ipc::types::{AppState, Request};
use crate::settings::{section_i64, SettingsSection};
use serde_json::{json, Value};

fn handle_create(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let affiliate_id = required_str(ctx.params, "affiliateId")?;
    let order_id = required_str(ctx.params, "orderId")?;
    let amount_cents = optional_i64(ctx.params, "amountCents")?;
    let rate_percent = section_i64(ctx.conn, SettingsSection::Payments, "commissionRatePercent")?;
    let commission_id =
        commissions::create_commission(ctx.conn, affiliate_id, order_id, amount_cents, rate_percent)?;
    Ok(json!({ "commissionId": commission_id }))
}

fn handle_update_status(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let commission_id = required_str(ctx.params, "commissionId")?;
    let status = required_str(ctx.params, "status")?;
    commissions::update_status(ctx.conn, commission_id, status)?;
    Ok(json!({ "ok": true }))
}

fn handle_stats(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let affiliate_id = optional_str(ctx.params, "affiliateId")?;
    Ok(json!({ "stats": commissions::commission_stats(ctx.conn, affiliate_id)? }))
}

fn handle_payout(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let affiliate_id = required_str(ctx.params, "affiliateId")?;
    let hold_days = section_i64(ctx.conn, SettingsSection::Payments, "payoutHoldDays")?;
    let payout = commissions::payout(ctx.conn, affiliate_id, hold_days)?;
    Ok(json!({ "payout": payout }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "commissions.create" => handle_create,
        "commissions.updateStatus" => handle_update_status,
        "commissions.stats" => handle_stats,
        "commissions.payout" => handle_payout,
        _ => return None,
    };
    Some(dispatch(state, req, Some(COMMISSION_MANAGE), handler))
}
