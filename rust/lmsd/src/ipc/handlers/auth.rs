use crate::auth::{self, Role, USER_MANAGE};
use crate::error::{LmsError, LmsResult};
use crate::ipc::helpers::{dispatch, optional_str, paging, required_str, Ctx, Handler};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_bootstrap(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let name = required_str(ctx.params, "name")?;
    let email = required_str(ctx.params, "email")?;
    let user_id = auth::bootstrap(ctx.conn, name, email)?;
    Ok(json!({ "userId": user_id }))
}

fn handle_permissions(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let target = match optional_str(ctx.params, "userId")? {
        Some(id) => id,
        None => ctx
            .actor
            .ok_or_else(|| LmsError::Unauthorized("missing actor".to_string()))?,
    };
    if ctx.actor != Some(target) {
        auth::require_permission(ctx.conn, ctx.actor, USER_MANAGE)?;
    }
    let perms = match auth::effective_permissions(ctx.conn, target) {
        Err(LmsError::NotFound(_)) if ctx.actor == Some(target) => {
            return Err(LmsError::Unauthorized("unknown actor".to_string()))
        }
        other => other?,
    };
    Ok(json!({ "userId": target, "permissions": perms }))
}

fn handle_grant(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let permission = required_str(ctx.params, "permission")?;
    auth::grant(ctx.conn, user_id, permission)?;
    tracing::info!(actor = ?ctx.actor, user_id, permission, "permission granted");
    Ok(json!({ "ok": true }))
}

fn handle_revoke(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let permission = required_str(ctx.params, "permission")?;
    auth::revoke(ctx.conn, user_id, permission)?;
    tracing::info!(actor = ?ctx.actor, user_id, permission, "permission revoked");
    Ok(json!({ "ok": true }))
}

fn parse_role(raw: &str) -> LmsResult<Role> {
    Role::parse(raw).ok_or_else(|| {
        LmsError::bad_params("role must be one of: student, instructor, admin, super_admin")
    })
}

fn handle_users_create(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let name = required_str(ctx.params, "name")?;
    let email = required_str(ctx.params, "email")?;
    let role = parse_role(optional_str(ctx.params, "role")?.unwrap_or("student"))?;
    if role == Role::SuperAdmin {
        return Err(LmsError::bad_params(
            "super admins are only created through auth.bootstrap",
        ));
    }
    let user_id = auth::insert_user(ctx.conn, name, email, role)?;
    Ok(json!({ "userId": user_id }))
}

fn handle_users_list(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let role = optional_str(ctx.params, "role")?.map(parse_role).transpose()?;
    let (limit, offset) = paging(ctx)?;
    let users = auth::list_users(ctx.conn, role, limit, offset)?;
    Ok(json!({ "users": users }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let (permission, handler): (Option<&'static str>, Handler) =
        match req.method.as_str() {
            "auth.bootstrap" => (None, handle_bootstrap),
            "auth.permissions" => (None, handle_permissions),
            "auth.grant" => (Some(USER_MANAGE), handle_grant),
            "auth.revoke" => (Some(USER_MANAGE), handle_revoke),
            "users.create" => (Some(USER_MANAGE), handle_users_create),
            "users.list" => (Some(USER_MANAGE), handle_users_list),
            _ => return None,
        };
    Some(dispatch(state, req, permission, handler))
}
