use crate::auth::REPORT_VIEW;
use crate::error::LmsResult;
use crate::ipc::helpers::{dispatch, optional_str, required_str, Ctx, Handler};
use crate::ipc::types::{AppState, Request};
use crate::progress;
use serde_json::{json, Value};

fn handle_course(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let course_id = required_str(ctx.params, "courseId")?;
    let p = progress::compute_course_progress(ctx.conn, user_id, course_id)?;
    Ok(json!({ "progress": p }))
}

fn handle_chapters(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let course_id = required_str(ctx.params, "courseId")?;
    let chapters = progress::compute_chapter_progress(ctx.conn, user_id, course_id)?;
    Ok(json!({ "chapters": chapters }))
}

fn handle_statistics(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let course_id = optional_str(ctx.params, "courseId")?;
    let stats = progress::compute_cohort_statistics(ctx.conn, course_id)?;
    Ok(json!({ "statistics": stats }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "progress.course" => handle_course,
        "progress.chapters" => handle_chapters,
        "progress.statistics" => handle_statistics,
        _ => return None,
    };
    Some(dispatch(state, req, Some(REPORT_VIEW), handler))
}
