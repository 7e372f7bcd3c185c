use crate::auth::RATING_MANAGE;
use crate::error::{LmsError, LmsResult};
use crate::ipc::helpers::{dispatch, optional_str, required_i64, required_str, Ctx, Handler};
use crate::ipc::types::{AppState, Request};
use crate::ratings::{self, RatingTarget};
use serde_json::{json, Value};

fn handle_create(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let user_id = required_str(ctx.params, "userId")?;
    let score = required_i64(ctx.params, "score")?;
    let comment = optional_str(ctx.params, "comment")?;
    let target = match (
        optional_str(ctx.params, "courseId")?,
        optional_str(ctx.params, "instructorId")?,
    ) {
        (Some(c), None) => RatingTarget::Course(c),
        (None, Some(i)) => RatingTarget::Instructor(i),
        _ => {
            return Err(LmsError::bad_params(
                "exactly one of courseId or instructorId is required",
            ))
        }
    };
    let rating_id = ratings::create_rating(ctx.conn, user_id, target, score, comment)?;
    Ok(json!({ "ratingId": rating_id }))
}

fn handle_moderate(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let rating_id = required_str(ctx.params, "ratingId")?;
    let status = required_str(ctx.params, "status")?;
    ratings::moderate(ctx.conn, rating_id, status)?;
    Ok(json!({ "ok": true }))
}

fn handle_stats(ctx: &Ctx<'_>) -> LmsResult<Value> {
    let course_id = optional_str(ctx.params, "courseId")?;
    Ok(json!({ "stats": ratings::rating_stats(ctx.conn, course_id)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let handler: Handler = match req.method.as_str() {
        "ratings.create" => handle_create,
        "ratings.moderate" => handle_moderate,
        "ratings.stats" => handle_stats,
        _ => return None,
    };
    Some(dispatch(state, req, Some(RATING_MANAGE), handler))
}
