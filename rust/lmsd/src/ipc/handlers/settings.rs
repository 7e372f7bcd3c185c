use crate::auth::SETTING_MANAGE;
use crate::error::{LmsError, LmsResult};
use crate::ipc::helpers::{dispatch, required_str, Ctx, Handler};
use crate::ipc::types::{AppState, Request};
use crate::settings::{self, SettingsSection};
use serde_json::{json, Map, Value};

fn handle_get(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let mut out = Map::new();
    for section in SettingsSection::ALL {
        out.insert(
            section.name().to_string(),
            settings::load_section(ctx.conn, section)?,
        );
    }
    Ok(Value::Object(out))
}

fn handle_update(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let section_raw = required_str(ctx.params, "section")?;
    let Some(section) = SettingsSection::parse(section_raw) else {
        return Err(LmsError::bad_params("unknown section"));
    };
    let Some(patch) = ctx.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(LmsError::bad_params("patch must be an object"));
    };
    let mut current = settings::load_section(ctx.conn, section)?;
    settings::merge_section_patch(section, &mut current, patch).map_err(LmsError::BadParams)?;
    settings::save_section(ctx.conn, section, &current)?;
    tracing::info!(actor = ?ctx.actor, section = section.name(), "settings updated");
    Ok(json!({ "section": section.name(), "value": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "settings.get" => handle_get,
        "settings.update" => handle_update,
        _ => return None,
    };
    Some(dispatch(state, req, Some(SETTING_MANAGE), handler))
}
