//! Learner progress derived from raw curriculum tracking rows.
//!
//! Nothing here is cached: every call recomputes from `curriculum_trackings`
//! joined against the live curriculum. A tracking row only counts when the
//! item it points at still exists inside one of the course's chapters, so
//! deleted chapters or items silently drop out of both numerator and
//! denominator.

use crate::curriculum::course_exists;
use crate::error::LmsResult;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn from_percentage(p: f64) -> Self {
        if p <= 0.0 {
            ProgressStatus::NotStarted
        } else if p >= 100.0 {
            ProgressStatus::Completed
        } else {
            ProgressStatus::InProgress
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }
}

/// Half-away-from-zero rounding to 2 decimals.
pub fn round_2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Percentage of `completed` over `total`, rounded to 2 decimals.
///
/// Rounding never crosses a status boundary: a partial count stays inside
/// `[0.01, 99.99]`, so 100.00 is reported only when every item is done and
/// 0.00 only when none is.
pub fn progress_percentage(completed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    let completed = completed.clamp(0, total);
    if completed == 0 {
        return 0.0;
    }
    if completed == total {
        return 100.0;
    }
    round_2(completed as f64 * 100.0 / total as f64).clamp(0.01, 99.99)
}

/// `accepted / total * 100` rounded to 2 decimals; 0 when there is nothing to rate.
pub fn acceptance_rate(accepted: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    round_2(accepted.clamp(0, total) as f64 * 100.0 / total as f64)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub user_id: String,
    pub course_id: String,
    pub progress_percentage: f64,
    pub status: ProgressStatus,
    pub first_tracking_date: Option<String>,
    pub completed_items: i64,
    pub total_items: i64,
    pub course_found: bool,
}

impl CourseProgress {
    fn empty(user_id: &str, course_id: &str, course_found: bool) -> Self {
        Self {
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            progress_percentage: 0.0,
            status: ProgressStatus::NotStarted,
            first_tracking_date: None,
            completed_items: 0,
            total_items: 0,
            course_found,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterProgress {
    pub chapter_id: String,
    pub title: String,
    pub sort_order: i64,
    pub completed_items: i64,
    pub total_items: i64,
    pub progress_percentage: f64,
    pub status: ProgressStatus,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortStatistics {
    pub total_enrollments: usize,
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub average_progress: f64,
}

fn count_course_items(conn: &Connection, course_id: &str) -> LmsResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*)
         FROM curriculum_items ci
         JOIN chapters ch ON ch.id = ci.chapter_id AND ch.course_id = ?1
         WHERE ci.course_id = ?1",
        [course_id],
        |r| r.get(0),
    )?)
}

/// Completed live items and the earliest of those completions. Tracking rows
/// whose item was deleted count toward neither.
fn completed_items_summary(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
) -> LmsResult<(i64, Option<String>)> {
    Ok(conn.query_row(
        "SELECT COUNT(*), MIN(COALESCE(t.completed_at, t.created_at))
         FROM curriculum_trackings t
         JOIN curriculum_items ci ON ci.kind = t.item_type AND ci.id = t.item_id
         JOIN chapters ch ON ch.id = ci.chapter_id AND ch.course_id = ?2
         WHERE t.user_id = ?1 AND ci.course_id = ?2 AND t.status = 'completed'",
        (user_id, course_id),
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?)
}

pub fn compute_course_progress(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
) -> LmsResult<CourseProgress> {
    if !course_exists(conn, course_id)? {
        return Ok(CourseProgress::empty(user_id, course_id, false));
    }
    let total = count_course_items(conn, course_id)?;
    if total == 0 {
        // A course without curriculum is "not started" whatever was tracked.
        return Ok(CourseProgress::empty(user_id, course_id, true));
    }
    let (completed, first_tracking_date) = completed_items_summary(conn, user_id, course_id)?;

    let progress_percentage = progress_percentage(completed, total);
    Ok(CourseProgress {
        user_id: user_id.to_string(),
        course_id: course_id.to_string(),
        progress_percentage,
        status: ProgressStatus::from_percentage(progress_percentage),
        first_tracking_date,
        completed_items: completed.min(total),
        total_items: total,
        course_found: true,
    })
}

/// Per-chapter rollup. A chapter is completed only when every item in it has
/// a completed tracking row; empty chapters stay not started.
pub fn compute_chapter_progress(
    conn: &Connection,
    user_id: &str,
    course_id: &str,
) -> LmsResult<Vec<ChapterProgress>> {
    let mut stmt = conn.prepare(
        "SELECT
           ch.id,
           ch.title,
           ch.sort_order,
           (SELECT COUNT(*) FROM curriculum_items ci WHERE ci.chapter_id = ch.id) AS total,
           (SELECT COUNT(*)
              FROM curriculum_trackings t
              JOIN curriculum_items ci ON ci.kind = t.item_type AND ci.id = t.item_id
              WHERE ci.chapter_id = ch.id AND t.user_id = ?1 AND t.status = 'completed') AS done
         FROM chapters ch
         WHERE ch.course_id = ?2
         ORDER BY ch.sort_order, ch.id",
    )?;
    let rows = stmt
        .query_map((user_id, course_id), |r| {
            let total: i64 = r.get(3)?;
            let done: i64 = r.get(4)?;
            let pct = progress_percentage(done, total);
            Ok(ChapterProgress {
                chapter_id: r.get(0)?,
                title: r.get(1)?,
                sort_order: r.get(2)?,
                completed_items: done.min(total),
                total_items: total,
                progress_percentage: pct,
                status: ProgressStatus::from_percentage(pct),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Distinct (user, course) pairs appearing in completed orders.
pub fn enrollment_pairs(
    conn: &Connection,
    course_id: Option<&str>,
) -> LmsResult<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT o.user_id, oi.course_id
         FROM orders o
         JOIN order_items oi ON oi.order_id = o.id
         WHERE o.status = 'completed' AND (?1 IS NULL OR oi.course_id = ?1)
         ORDER BY oi.course_id, o.user_id",
    )?;
    let pairs = stmt
        .query_map([course_id], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pairs)
}

/// Cohort statistics over every derived enrollment. Each pair goes through the
/// same percentage/status rules as [`compute_course_progress`]; counts come
/// from two grouped queries rather than one query per pair.
pub fn compute_cohort_statistics(
    conn: &Connection,
    course_id: Option<&str>,
) -> LmsResult<CohortStatistics> {
    let pairs = enrollment_pairs(conn, course_id)?;
    if pairs.is_empty() {
        return Ok(CohortStatistics::default());
    }

    let mut totals_stmt = conn.prepare(
        "SELECT ci.course_id, COUNT(*)
         FROM curriculum_items ci
         JOIN chapters ch ON ch.id = ci.chapter_id AND ch.course_id = ci.course_id
         JOIN courses c ON c.id = ci.course_id
         GROUP BY ci.course_id",
    )?;
    let totals: HashMap<String, i64> = totals_stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;

    let mut done_stmt = conn.prepare(
        "SELECT t.user_id, ci.course_id, COUNT(*)
         FROM curriculum_trackings t
         JOIN curriculum_items ci ON ci.kind = t.item_type AND ci.id = t.item_id
         JOIN chapters ch ON ch.id = ci.chapter_id AND ch.course_id = ci.course_id
         WHERE t.status = 'completed'
         GROUP BY t.user_id, ci.course_id",
    )?;
    let done: HashMap<(String, String), i64> = done_stmt
        .query_map([], |r| Ok(((r.get(0)?, r.get(1)?), r.get(2)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;

    let mut stats = CohortStatistics {
        total_enrollments: pairs.len(),
        ..CohortStatistics::default()
    };
    let mut sum = 0.0;
    for (user_id, course_id) in pairs {
        let total = totals.get(&course_id).copied().unwrap_or(0);
        let completed = done.get(&(user_id, course_id)).copied().unwrap_or(0);
        let pct = progress_percentage(completed, total);
        sum += pct;
        match ProgressStatus::from_percentage(pct) {
            ProgressStatus::NotStarted => stats.not_started += 1,
            ProgressStatus::InProgress => stats.in_progress += 1,
            ProgressStatus::Completed => stats.completed += 1,
        }
    }
    stats.average_progress = round_2(sum / stats.total_enrollments as f64);
    Ok(stats)
}
