use crate::assignments;
use crate::auth::ASSIGNMENT_GRADE;
use crate::error::LmsResult;
use crate::ipc::helpers::{dispatch, optional_f64, optional_str, required_str, Ctx, Handler};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn handle_submit(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let assignment_id = required_str(ctx.params, "assignmentId")?;
    let user_id = required_str(ctx.params, "userId")?;
    let submission = assignments::submit(ctx.conn, assignment_id, user_id)?;
    Ok(json!({ "submission": submission }))
}

fn handle_grade(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let submission_id = required_str(ctx.params, "submissionId")?;
    let status = required_str(ctx.params, "status")?;
    let grade = optional_f64(ctx.params, "grade")?;
    let feedback = optional_str(ctx.params, "feedback")?;
    let submission = assignments::grade(ctx.conn, submission_id, status, grade, feedback)?;
    Ok(json!({ "submission": submission }))
}

fn handle_stats(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let assignment_id = optional_str(ctx.params, "assignmentId")?;
    let course_id = optional_str(ctx.params, "courseId")?;
    let stats = assignments::stats(ctx.conn, assignment_id, course_id)?;
    Ok(json!({ "stats": stats }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "assignments.submit" => handle_submit,
        "assignments.grade" => handle_grade,
        "assignments.stats" => handle_stats,
        _ => return None,
    };
    Some(dispatch(state, req, Some(ASSIGNMENT_GRADE), handler))
}
