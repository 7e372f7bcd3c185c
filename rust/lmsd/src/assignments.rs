use crate::db::now_rfc3339;
use crate::error::{LmsError, LmsResult};
use crate::progress::acceptance_rate;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub assignment_id: String,
    pub user_id: String,
    pub status: String,
    pub grade: Option<f64>,
    pub feedback: Option<String>,
    pub submitted_at: String,
    pub graded_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStats {
    pub total: i64,
    pub pending: i64,
    pub accepted: i64,
    pub rejected: i64,
    pub acceptance_rate: f64,
    pub average_grade: Option<f64>,
}

fn load_submission(conn: &Connection, submission_id: &str) -> LmsResult<Submission> {
    conn.query_row(
        "SELECT id, assignment_id, user_id, status, grade, feedback, submitted_at, graded_at
         FROM assignment_submissions WHERE id = ?",
        [submission_id],
        |r| {
            Ok(Submission {
                id: r.get(0)?,
                assignment_id: r.get(1)?,
                user_id: r.get(2)?,
                status: r.get(3)?,
                grade: r.get(4)?,
                feedback: r.get(5)?,
                submitted_at: r.get(6)?,
                graded_at: r.get(7)?,
            })
        },
    )
    .optional()?
    .ok_or(LmsError::NotFound("submission"))
}

/// Record a submission. A learner may resubmit only after a rejection; a
/// pending or accepted submission blocks another one.
pub fn submit(conn: &Connection, assignment_id: &str, user_id: &str) -> LmsResult<Submission> {
    let assignment: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM assignments WHERE id = ?",
            [assignment_id],
            |r| r.get(0),
        )
        .optional()?;
    if assignment.is_none() {
        return Err(LmsError::NotFound("assignment"));
    }
    let user: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| r.get(0))
        .optional()?;
    if user.is_none() {
        return Err(LmsError::NotFound("user"));
    }
    let open: i64 = conn.query_row(
        "SELECT COUNT(*) FROM assignment_submissions
         WHERE assignment_id = ? AND user_id = ? AND status IN ('pending', 'accepted')",
        (assignment_id, user_id),
        |r| r.get(0),
    )?;
    if open > 0 {
        return Err(LmsError::invalid_state(
            "a pending or accepted submission already exists",
        ));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO assignment_submissions(id, assignment_id, user_id, status, submitted_at)
         VALUES(?, ?, ?, 'pending', ?)",
        (&id, assignment_id, user_id, now_rfc3339()),
    )?;
    load_submission(conn, &id)
}

pub fn grade(
    conn: &Connection,
    submission_id: &str,
    status: &str,
    grade: Option<f64>,
    feedback: Option<&str>,
) -> LmsResult<Submission> {
    if !matches!(status, "accepted" | "rejected") {
        return Err(LmsError::bad_params("status must be accepted or rejected"));
    }
    if let Some(g) = grade {
        if !g.is_finite() || !(0.0..=100.0).contains(&g) {
            return Err(LmsError::bad_params("grade must be between 0 and 100"));
        }
    }
    let current = load_submission(conn, submission_id)?;
    if current.status != "pending" {
        return Err(LmsError::invalid_state(format!(
            "submission is already {}",
            current.status
        )));
    }
    conn.execute(
        "UPDATE assignment_submissions
         SET status = ?, grade = ?, feedback = ?, graded_at = ?
         WHERE id = ? AND status = 'pending'",
        (status, grade, feedback, now_rfc3339(), submission_id),
    )?;
    load_submission(conn, submission_id)
}

/// Counts per grading status plus the acceptance rate. The rate's
/// denominator is every submission in scope, pending ones included.
pub fn stats(
    conn: &Connection,
    assignment_id: Option<&str>,
    course_id: Option<&str>,
) -> LmsResult<SubmissionStats> {
    let (total, pending, accepted, rejected, average_grade): (i64, i64, i64, i64, Option<f64>) =
        conn.query_row(
            "SELECT
               COUNT(*),
               COALESCE(SUM(CASE WHEN s.status = 'pending' THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN s.status = 'accepted' THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN s.status = 'rejected' THEN 1 ELSE 0 END), 0),
               AVG(s.grade)
             FROM assignment_submissions s
             JOIN assignments a ON a.id = s.assignment_id
             WHERE (?1 IS NULL OR s.assignment_id = ?1)
               AND (?2 IS NULL OR a.course_id = ?2)",
            (assignment_id, course_id),
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )?;
    Ok(SubmissionStats {
        total,
        pending,
        accepted,
        rejected,
        acceptance_rate: acceptance_rate(accepted, total),
        average_grade: average_grade.map(crate::progress::round_2),
    })
}
