use crate::auth::require_permission;
use crate::config::Config;
use crate::error::{LmsError, LmsResult};
use crate::ipc::error::{err, lms_err, ok};
use crate::ipc::types::{AppState, Request};
use crate::settings::{section_i64, SettingsSection};
use rusqlite::Connection;
use serde_json::Value;

const MAX_PAGE_SIZE: i64 = 500;

/// Everything a handler needs once the workspace and permission checks passed.
pub struct Ctx<'a> {
    pub conn: &'a Connection,
    pub config: &'a Config,
    pub params: &'a Value,
    pub actor: Option<&'a str>,
}

pub type Handler = fn(&Ctx<'_>) -> LmsResult<Value>;

/// Run `handler` against the open workspace after checking `permission`
/// (when given) for the request's actor.
pub fn dispatch(
    state: &AppState,
    req: &Request,
    permission: Option<&'static str>,
    handler: Handler,
) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let actor = req.actor.as_deref();
    if let Some(permission) = permission {
        if let Err(e) = require_permission(conn, actor, permission) {
            return lms_err(&req.id, &req.method, &e);
        }
    }
    let ctx = Ctx {
        conn,
        config: &state.config,
        params: &req.params,
        actor,
    };
    match handler(&ctx) {
        Ok(result) => ok(&req.id, result),
        Err(e) => lms_err(&req.id, &req.method, &e),
    }
}

pub fn required_str<'a>(params: &'a Value, key: &str) -> LmsResult<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| LmsError::bad_params(format!("missing params.{}", key)))
}

pub fn optional_str<'a>(params: &'a Value, key: &str) -> LmsResult<Option<&'a str>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(LmsError::bad_params(format!("{} must be string", key))),
    }
}

pub fn required_i64(params: &Value, key: &str) -> LmsResult<i64> {
    optional_i64(params, key)?
        .ok_or_else(|| LmsError::bad_params(format!("missing params.{}", key)))
}

pub fn optional_i64(params: &Value, key: &str) -> LmsResult<Option<i64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| LmsError::bad_params(format!("{} must be integer", key))),
    }
}

pub fn optional_f64(params: &Value, key: &str) -> LmsResult<Option<f64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| LmsError::bad_params(format!("{} must be a number", key))),
    }
}

pub fn optional_bool(params: &Value, key: &str) -> LmsResult<Option<bool>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| LmsError::bad_params(format!("{} must be boolean", key))),
    }
}

pub fn string_list(params: &Value, key: &str) -> LmsResult<Vec<String>> {
    let Some(arr) = params.get(key).and_then(|v| v.as_array()) else {
        return Err(LmsError::bad_params(format!("{} must be an array", key)));
    };
    arr.iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| LmsError::bad_params(format!("{} must contain strings", key)))
        })
        .collect()
}

/// `limit`/`offset` for list methods. The default page size is the
/// `general.itemsPerPage` setting.
pub fn paging(ctx: &Ctx<'_>) -> LmsResult<(i64, i64)> {
    let limit = match optional_i64(ctx.params, "limit")? {
        Some(l) => l,
        None => section_i64(ctx.conn, SettingsSection::General, "itemsPerPage")?,
    };
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(LmsError::bad_params(format!(
            "limit must be in 1..={}",
            MAX_PAGE_SIZE
        )));
    }
    let offset = optional_i64(ctx.params, "offset")?.unwrap_or(0);
    if offset < 0 {
        return Err(LmsError::bad_params("offset must not be negative"));
    }
    Ok((limit, offset))
}
