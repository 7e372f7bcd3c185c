use crate::curriculum::course_exists;
use crate::db::now_rfc3339;
use crate::error::{LmsError, LmsResult};
use crate::progress::round_2;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingTarget<'a> {
    Course(&'a str),
    Instructor(&'a str),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    pub total: i64,
    pub course_count: i64,
    pub instructor_count: i64,
    pub average_score: f64,
    pub course_average: f64,
    pub instructor_average: f64,
    /// Count per score, index 0 is one star.
    pub score_buckets: [i64; 5],
    pub pending_count: i64,
}

pub fn create_rating(
    conn: &Connection,
    user_id: &str,
    target: RatingTarget<'_>,
    score: i64,
    comment: Option<&str>,
) -> LmsResult<String> {
    if !(1..=5).contains(&score) {
        return Err(LmsError::bad_params("score must be between 1 and 5"));
    }
    let user: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| r.get(0))
        .optional()?;
    if user.is_none() {
        return Err(LmsError::NotFound("user"));
    }
    let (category, course_id, instructor_id) = match target {
        RatingTarget::Course(cid) => {
            if !course_exists(conn, cid)? {
                return Err(LmsError::NotFound("course"));
            }
            ("course", Some(cid), None)
        }
        RatingTarget::Instructor(iid) => {
            let role: Option<String> = conn
                .query_row("SELECT role FROM users WHERE id = ?", [iid], |r| r.get(0))
                .optional()?;
            if role.as_deref() != Some("instructor") {
                return Err(LmsError::NotFound("instructor"));
            }
            ("instructor", None, Some(iid))
        }
    };
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO ratings(id, user_id, course_id, instructor_id, category, score, comment, status, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, 'pending', ?)",
        (
            &id,
            user_id,
            course_id,
            instructor_id,
            category,
            score,
            comment,
            now_rfc3339(),
        ),
    )?;
    Ok(id)
}

/// Set moderation status. Moderators may flip a decision, so any status may
/// move to `approved` or `rejected`.
pub fn moderate(conn: &Connection, rating_id: &str, status: &str) -> LmsResult<()> {
    if !matches!(status, "approved" | "rejected" | "pending") {
        return Err(LmsError::bad_params(
            "status must be pending, approved or rejected",
        ));
    }
    let changed = conn.execute(
        "UPDATE ratings SET status = ? WHERE id = ?",
        (status, rating_id),
    )?;
    if changed == 0 {
        return Err(LmsError::NotFound("rating"));
    }
    Ok(())
}

/// Breakdown by category and score bucket in one query. Averages cover
/// approved ratings only; counts cover every rating.
pub fn rating_stats(conn: &Connection, course_id: Option<&str>) -> LmsResult<RatingStats> {
    let row = conn.query_row(
        "SELECT
           COUNT(*),
           COALESCE(SUM(CASE WHEN category = 'course' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN category = 'instructor' THEN 1 ELSE 0 END), 0),
           AVG(CASE WHEN status = 'approved' THEN score END),
           AVG(CASE WHEN status = 'approved' AND category = 'course' THEN score END),
           AVG(CASE WHEN status = 'approved' AND category = 'instructor' THEN score END),
           COALESCE(SUM(CASE WHEN score = 1 THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN score = 2 THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN score = 3 THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN score = 4 THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN score = 5 THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0)
         FROM ratings
         WHERE (?1 IS NULL OR course_id = ?1)",
        [course_id],
        |r| {
            Ok(RatingStats {
                total: r.get(0)?,
                course_count: r.get(1)?,
                instructor_count: r.get(2)?,
                average_score: round_2(r.get::<_, Option<f64>>(3)?.unwrap_or(0.0)),
                course_average: round_2(r.get::<_, Option<f64>>(4)?.unwrap_or(0.0)),
                instructor_average: round_2(r.get::<_, Option<f64>>(5)?.unwrap_or(0.0)),
                score_buckets: [r.get(6)?, r.get(7)?, r.get(8)?, r.get(9)?, r.get(10)?],
                pending_count: r.get(11)?,
            })
        },
    )?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{insert_user, Role};
    use crate::curriculum::create_course;
    use crate::db::init_schema;

    #[test]
    fn single_query_breakdown_matches_rows() {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn).expect("schema");
        let s = insert_user(&conn, "Stu", "stu@example.com", Role::Student).expect("user");
        let t = insert_user(&conn, "Tea", "tea@example.com", Role::Instructor).expect("user");
        let course = create_course(&conn, "Go", Some(&t), 0).expect("course");

        let r1 = create_rating(&conn, &s, RatingTarget::Course(&course), 5, None).expect("r1");
        let r2 = create_rating(&conn, &s, RatingTarget::Course(&course), 2, Some("meh")).expect("r2");
        let r3 = create_rating(&conn, &s, RatingTarget::Instructor(&t), 4, None).expect("r3");
        let _pending = create_rating(&conn, &s, RatingTarget::Instructor(&t), 1, None).expect("r4");
        assert!(create_rating(&conn, &s, RatingTarget::Course(&course), 6, None).is_err());
        assert!(create_rating(&conn, &s, RatingTarget::Instructor(&s), 3, None).is_err());

        for id in [&r1, &r2, &r3] {
            moderate(&conn, id, "approved").expect("approve");
        }

        let stats = rating_stats(&conn, None).expect("stats");
        assert_eq!(stats.total, 4);
        assert_eq!(stats.course_count, 2);
        assert_eq!(stats.instructor_count, 2);
        assert_eq!(stats.score_buckets, [1, 1, 0, 1, 1]);
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.average_score, 3.67);
        assert_eq!(stats.course_average, 3.5);
        assert_eq!(stats.instructor_average, 4.0);

        let course_only = rating_stats(&conn, Some(&course)).expect("stats");
        assert_eq!(course_only.total, 2);
        assert_eq!(course_only.instructor_count, 0);
    }

    #[test]
    fn empty_table_reports_zeroes() {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn).expect("schema");
        let stats = rating_stats(&conn, None).expect("stats");
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_score, 0.0);
        assert_eq!(stats.score_buckets, [0; 5]);
    }
}
