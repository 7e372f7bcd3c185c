use crate::auth::COURSE_MANAGE;
use crate::curriculum::{self, CoursePatch, ItemKind};
use crate::error::{LmsError, LmsResult};
use crate::ipc::helpers::{dispatch, optional_i64, optional_str, required_str, Ctx, Handler};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

pub(super) fn parse_kind(ctx: &Ctx<'_>) -> LmsResult<ItemKind> {
    let raw = required_str(ctx.params, "kind")?;
    ItemKind::parse(raw).ok_or_else(|| {
        LmsError::bad_params("kind must be one of: lecture, quiz, assignment, resource")
    })
}

fn handle_create(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let title = required_str(ctx.params, "title")?;
    let instructor_id = optional_str(ctx.params, "instructorId")?;
    let price_cents = optional_i64(ctx.params, "priceCents")?.unwrap_or(0);
    let course_id = curriculum::create_course(ctx.conn, title, instructor_id, price_cents)?;
    Ok(json!({ "courseId": course_id }))
}

fn handle_list(ctx: &Ctx<'_>) -> LmsResult<Value> {
    Ok(json!({ "courses": curriculum::list_courses(ctx.conn)? }))
}

fn handle_get(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let course_id = required_str(ctx.params, "courseId")?;
    Ok(json!({ "course": curriculum::course_tree(ctx.conn, course_id)? }))
}

fn handle_update(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let course_id = required_str(ctx.params, "courseId")?;
    let Some(patch) = ctx.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(LmsError::bad_params("patch must be an object"));
    };
    let mut parsed = CoursePatch::default();
    for (k, v) in patch {
        match k.as_str() {
            "title" => {
                let s = v
                    .as_str()
                    .ok_or_else(|| LmsError::bad_params("title must be string"))?;
                parsed.title = Some(s.to_string());
            }
            "priceCents" => {
                parsed.price_cents = Some(
                    v.as_i64()
                        .ok_or_else(|| LmsError::bad_params("priceCents must be integer"))?,
                );
            }
            "status" => {
                let s = v
                    .as_str()
                    .ok_or_else(|| LmsError::bad_params("status must be string"))?;
                parsed.status = Some(s.to_string());
            }
            "instructorId" => {
                parsed.instructor_id = Some(match v {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    _ => return Err(LmsError::bad_params("instructorId must be string or null")),
                });
            }
            other => return Err(LmsError::bad_params(format!("unknown course field: {}", other))),
        }
    }
    curriculum::update_course(ctx.conn, course_id, &parsed)?;
    Ok(json!({ "ok": true }))
}

fn handle_delete(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let course_id = required_str(ctx.params, "courseId")?;
    curriculum::delete_course(ctx.conn, course_id)?;
    Ok(json!({ "ok": true }))
}

fn handle_chapter_create(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let course_id = required_str(ctx.params, "courseId")?;
    let title = required_str(ctx.params, "title")?;
    let chapter_id = curriculum::create_chapter(ctx.conn, course_id, title)?;
    Ok(json!({ "chapterId": chapter_id }))
}

fn handle_chapter_delete(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let chapter_id = required_str(ctx.params, "chapterId")?;
    curriculum::delete_chapter(ctx.conn, chapter_id)?;
    Ok(json!({ "ok": true }))
}

fn handle_add_item(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let chapter_id = required_str(ctx.params, "chapterId")?;
    let kind = parse_kind(ctx)?;
    let title = required_str(ctx.params, "title")?;
    let item_id = curriculum::add_item(ctx.conn, chapter_id, kind, title)?;
    Ok(json!({ "itemId": item_id, "kind": kind }))
}

fn handle_remove_item(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let kind = parse_kind(ctx)?;
    let item_id = required_str(ctx.params, "itemId")?;
    curriculum::remove_item(ctx.conn, kind, item_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "courses.create" => handle_create,
        "courses.list" => handle_list,
        "courses.get" => handle_get,
        "courses.update" => handle_update,
        "courses.delete" => handle_delete,
        "chapters.create" => handle_chapter_create,
        "chapters.delete" => handle_chapter_delete,
        "curriculum.addItem" => handle_add_item,
        "curriculum.removeItem" => handle_remove_item,
        _ => return None,
    };
    Some(dispatch(state, req, Some(COURSE_MANAGE), handler))
}
