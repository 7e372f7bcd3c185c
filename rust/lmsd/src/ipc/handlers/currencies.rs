use crate::auth::SETTING_MANAGE;
use crate::currency;
use crate::error::LmsResult;
use crate::ipc::helpers::{
    dispatch, optional_bool, optional_f64, optional_str, required_i64, required_str, Ctx, Handler,
};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_upsert(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let code = required_str(ctx.params, "code")?;
    let symbol = optional_str(ctx.params, "symbol")?.unwrap_or("");
    let rate = optional_f64(ctx.params, "ratePerDefault")?.unwrap_or(1.0);
    let is_default = optional_bool(ctx.params, "isDefault")?.unwrap_or(false);
    currency::upsert(ctx.conn, code, symbol, rate, is_default)?;
    Ok(json!({ "ok": true }))
}

fn handle_list(ctx: &Ctx<'_>) -> LmsResult<Value> {
    Ok(json!({
        "defaultCurrency": ctx.config.default_currency,
        "currencies": currency::list(ctx.conn)?
    }))
}

fn handle_convert(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let amount_cents = required_i64(ctx.params, "amountCents")?;
    let to = currency::normalize_code(required_str(ctx.params, "to")?)?;
    let converted = currency::convert(ctx.conn, amount_cents, &to, &ctx.config.default_currency)?;
    Ok(json!({ "amountCents": converted, "currency": to }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "currencies.upsert" => handle_upsert,
        "currencies.list" => handle_list,
        "currencies.convert" => handle_convert,
        _ => return None,
    };
    Some(dispatch(state, req, Some(SETTING_MANAGE), handler))
}
