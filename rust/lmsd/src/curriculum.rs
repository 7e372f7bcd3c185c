use crate::db::now_rfc3339;
use crate::error::{LmsError, LmsResult};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Lecture,
    Quiz,
    Assignment,
    Resource,
}

impl ItemKind {
    pub const ALL: [ItemKind; 4] = [
        ItemKind::Lecture,
        ItemKind::Quiz,
        ItemKind::Assignment,
        ItemKind::Resource,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lecture" => Some(Self::Lecture),
            "quiz" => Some(Self::Quiz),
            "assignment" => Some(Self::Assignment),
            "resource" => Some(Self::Resource),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lecture => "lecture",
            Self::Quiz => "quiz",
            Self::Assignment => "assignment",
            Self::Resource => "resource",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            Self::Lecture => "lectures",
            Self::Quiz => "quizzes",
            Self::Assignment => "assignments",
            Self::Resource => "resources",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRow {
    pub id: String,
    pub title: String,
    pub instructor_id: Option<String>,
    pub price_cents: i64,
    pub status: String,
    pub chapter_count: i64,
    pub item_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumItem {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterTree {
    pub id: String,
    pub title: String,
    pub sort_order: i64,
    pub items: Vec<CurriculumItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTree {
    pub id: String,
    pub title: String,
    pub instructor_id: Option<String>,
    pub price_cents: i64,
    pub status: String,
    pub chapters: Vec<ChapterTree>,
}

#[derive(Debug, Clone, Default)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub price_cents: Option<i64>,
    pub status: Option<String>,
    pub instructor_id: Option<Option<String>>,
}

fn validate_course_status(status: &str) -> LmsResult<()> {
    match status {
        "draft" | "published" => Ok(()),
        other => Err(LmsError::bad_params(format!(
            "status must be draft or published, got {}",
            other
        ))),
    }
}

pub fn course_exists(conn: &Connection, course_id: &str) -> LmsResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM courses WHERE id = ?", [course_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

fn require_instructor(conn: &Connection, instructor_id: &str) -> LmsResult<()> {
    let role: Option<String> = conn
        .query_row("SELECT role FROM users WHERE id = ?", [instructor_id], |r| {
            r.get(0)
        })
        .optional()?;
    match role.as_deref() {
        None => Err(LmsError::NotFound("instructor")),
        Some("instructor") => Ok(()),
        Some(_) => Err(LmsError::bad_params("instructorId must reference an instructor")),
    }
}

pub fn create_course(
    conn: &Connection,
    title: &str,
    instructor_id: Option<&str>,
    price_cents: i64,
) -> LmsResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(LmsError::bad_params("title must not be empty"));
    }
    if price_cents < 0 {
        return Err(LmsError::bad_params("priceCents must not be negative"));
    }
    if let Some(iid) = instructor_id {
        require_instructor(conn, iid)?;
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO courses(id, title, instructor_id, price_cents, status, created_at)
         VALUES(?, ?, ?, ?, 'draft', ?)",
        (&id, title, instructor_id, price_cents, now_rfc3339()),
    )?;
    Ok(id)
}

pub fn list_courses(conn: &Connection) -> LmsResult<Vec<CourseRow>> {
    // Correlated subqueries keep the counts independent of each other.
    let mut stmt = conn.prepare(
        "SELECT
           c.id,
           c.title,
           c.instructor_id,
           c.price_cents,
           c.status,
           (SELECT COUNT(*) FROM chapters ch WHERE ch.course_id = c.id) AS chapter_count,
           (SELECT COUNT(*)
              FROM curriculum_items ci
              JOIN chapters ch ON ch.id = ci.chapter_id AND ch.course_id = c.id) AS item_count
         FROM courses c
         ORDER BY c.title, c.id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(CourseRow {
                id: r.get(0)?,
                title: r.get(1)?,
                instructor_id: r.get(2)?,
                price_cents: r.get(3)?,
                status: r.get(4)?,
                chapter_count: r.get(5)?,
                item_count: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn course_tree(conn: &Connection, course_id: &str) -> LmsResult<CourseTree> {
    let row: Option<(String, Option<String>, i64, String)> = conn
        .query_row(
            "SELECT title, instructor_id, price_cents, status FROM courses WHERE id = ?",
            [course_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    let Some((title, instructor_id, price_cents, status)) = row else {
        return Err(LmsError::NotFound("course"));
    };

    let mut chapter_stmt = conn.prepare(
        "SELECT id, title, sort_order FROM chapters WHERE course_id = ? ORDER BY sort_order, id",
    )?;
    let mut chapters = chapter_stmt
        .query_map([course_id], |r| {
            Ok(ChapterTree {
                id: r.get(0)?,
                title: r.get(1)?,
                sort_order: r.get(2)?,
                items: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut item_stmt = conn.prepare(
        "SELECT id, kind, title, sort_order
         FROM curriculum_items
         WHERE chapter_id = ?
         ORDER BY sort_order, kind, id",
    )?;
    for chapter in chapters.iter_mut() {
        let items = item_stmt
            .query_map([&chapter.id], |r| {
                let kind: String = r.get(1)?;
                Ok((r.get::<_, String>(0)?, kind, r.get::<_, String>(2)?, r.get::<_, i64>(3)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        chapter.items = items
            .into_iter()
            .filter_map(|(id, kind, title, sort_order)| {
                ItemKind::parse(&kind).map(|kind| CurriculumItem {
                    id,
                    kind,
                    title,
                    sort_order,
                })
            })
            .collect();
    }

    Ok(CourseTree {
        id: course_id.to_string(),
        title,
        instructor_id,
        price_cents,
        status,
        chapters,
    })
}

pub fn update_course(conn: &Connection, course_id: &str, patch: &CoursePatch) -> LmsResult<()> {
    if !course_exists(conn, course_id)? {
        return Err(LmsError::NotFound("course"));
    }
    let tx = conn.unchecked_transaction()?;
    if let Some(title) = &patch.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(LmsError::bad_params("title must not be empty"));
        }
        tx.execute("UPDATE courses SET title = ? WHERE id = ?", (title, course_id))?;
    }
    if let Some(price) = patch.price_cents {
        if price < 0 {
            return Err(LmsError::bad_params("priceCents must not be negative"));
        }
        tx.execute(
            "UPDATE courses SET price_cents = ? WHERE id = ?",
            (price, course_id),
        )?;
    }
    if let Some(status) = &patch.status {
        validate_course_status(status)?;
        tx.execute(
            "UPDATE courses SET status = ? WHERE id = ?",
            (status, course_id),
        )?;
    }
    if let Some(instructor) = &patch.instructor_id {
        if let Some(iid) = instructor {
            require_instructor(&tx, iid)?;
        }
        tx.execute(
            "UPDATE courses SET instructor_id = ? WHERE id = ?",
            (instructor.as_deref(), course_id),
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Delete a course and everything hanging off it, in dependency order.
/// Orders and their items are kept: they are financial records.
pub fn delete_course(conn: &Connection, course_id: &str) -> LmsResult<()> {
    if !course_exists(conn, course_id)? {
        return Err(LmsError::NotFound("course"));
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM assignment_submissions
         WHERE assignment_id IN (SELECT id FROM assignments WHERE course_id = ?)",
        [course_id],
    )?;
    tx.execute(
        "DELETE FROM curriculum_trackings WHERE course_id = ?",
        [course_id],
    )?;
    for kind in ItemKind::ALL {
        tx.execute(
            &format!("DELETE FROM {} WHERE course_id = ?", kind.table()),
            [course_id],
        )?;
    }
    tx.execute("DELETE FROM chapters WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM certificates WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM ratings WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM courses WHERE id = ?", [course_id])?;
    tx.commit()?;
    tracing::info!(course_id, "course deleted");
    Ok(())
}

fn next_sort_order(conn: &Connection, sql: &str, parent_id: &str) -> LmsResult<i64> {
    let max: Option<i64> = conn.query_row(sql, [parent_id], |r| r.get(0))?;
    Ok(max.map(|m| m + 1).unwrap_or(0))
}

pub fn create_chapter(conn: &Connection, course_id: &str, title: &str) -> LmsResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(LmsError::bad_params("title must not be empty"));
    }
    if !course_exists(conn, course_id)? {
        return Err(LmsError::NotFound("course"));
    }
    let sort_order = next_sort_order(
        conn,
        "SELECT MAX(sort_order) FROM chapters WHERE course_id = ?",
        course_id,
    )?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO chapters(id, course_id, title, sort_order) VALUES(?, ?, ?, ?)",
        (&id, course_id, title, sort_order),
    )?;
    Ok(id)
}

pub fn delete_chapter(conn: &Connection, chapter_id: &str) -> LmsResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM chapters WHERE id = ?", [chapter_id], |r| {
            r.get(0)
        })
        .optional()?;
    if exists.is_none() {
        return Err(LmsError::NotFound("chapter"));
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM assignment_submissions
         WHERE assignment_id IN (SELECT id FROM assignments WHERE chapter_id = ?)",
        [chapter_id],
    )?;
    tx.execute(
        "DELETE FROM curriculum_trackings WHERE chapter_id = ?",
        [chapter_id],
    )?;
    for kind in ItemKind::ALL {
        tx.execute(
            &format!("DELETE FROM {} WHERE chapter_id = ?", kind.table()),
            [chapter_id],
        )?;
    }
    tx.execute("DELETE FROM chapters WHERE id = ?", [chapter_id])?;
    tx.commit()?;
    Ok(())
}

fn chapter_course(conn: &Connection, chapter_id: &str) -> LmsResult<String> {
    conn.query_row(
        "SELECT course_id FROM chapters WHERE id = ?",
        [chapter_id],
        |r| r.get(0),
    )
    .optional()?
    .ok_or(LmsError::NotFound("chapter"))
}

pub fn add_item(
    conn: &Connection,
    chapter_id: &str,
    kind: ItemKind,
    title: &str,
) -> LmsResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(LmsError::bad_params("title must not be empty"));
    }
    let course_id = chapter_course(conn, chapter_id)?;
    let sort_order = next_sort_order(
        conn,
        "SELECT MAX(sort_order) FROM curriculum_items WHERE chapter_id = ?",
        chapter_id,
    )?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        &format!(
            "INSERT INTO {}(id, course_id, chapter_id, title, sort_order) VALUES(?, ?, ?, ?, ?)",
            kind.table()
        ),
        (&id, &course_id, chapter_id, title, sort_order),
    )?;
    Ok(id)
}

pub fn remove_item(conn: &Connection, kind: ItemKind, item_id: &str) -> LmsResult<()> {
    let tx = conn.unchecked_transaction()?;
    if kind == ItemKind::Assignment {
        tx.execute(
            "DELETE FROM assignment_submissions WHERE assignment_id = ?",
            [item_id],
        )?;
    }
    tx.execute(
        "DELETE FROM curriculum_trackings WHERE item_type = ? AND item_id = ?",
        (kind.as_str(), item_id),
    )?;
    let removed = tx.execute(
        &format!("DELETE FROM {} WHERE id = ?", kind.table()),
        [item_id],
    )?;
    if removed == 0 {
        return Err(LmsError::NotFound("curriculum item"));
    }
    tx.commit()?;
    Ok(())
}

/// Record that `user_id` completed one curriculum item. Idempotent: a second
/// call for the same item keeps the original completion time and returns false.
pub fn complete_item(
    conn: &Connection,
    user_id: &str,
    kind: ItemKind,
    item_id: &str,
) -> LmsResult<bool> {
    let user: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| r.get(0))
        .optional()?;
    if user.is_none() {
        return Err(LmsError::NotFound("user"));
    }
    let item: Option<(String, String)> = conn
        .query_row(
            "SELECT course_id, chapter_id FROM curriculum_items WHERE kind = ? AND id = ?",
            (kind.as_str(), item_id),
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    let Some((course_id, chapter_id)) = item else {
        return Err(LmsError::NotFound("curriculum item"));
    };
    let previous: Option<String> = conn
        .query_row(
            "SELECT status FROM curriculum_trackings
             WHERE user_id = ? AND item_type = ? AND item_id = ?",
            (user_id, kind.as_str(), item_id),
            |r| r.get(0),
        )
        .optional()?;
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO curriculum_trackings(
            id, user_id, course_id, chapter_id, item_type, item_id, status, completed_at, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, 'completed', ?, ?)
         ON CONFLICT(user_id, item_type, item_id) DO UPDATE SET
           status = 'completed',
           completed_at = COALESCE(curriculum_trackings.completed_at, excluded.completed_at)",
        (
            Uuid::new_v4().to_string(),
            user_id,
            &course_id,
            &chapter_id,
            kind.as_str(),
            item_id,
            &now,
            &now,
        ),
    )?;
    Ok(previous.as_deref() != Some("completed"))
}

pub fn reset_tracking(conn: &Connection, user_id: &str, course_id: &str) -> LmsResult<usize> {
    let removed = conn.execute(
        "DELETE FROM curriculum_trackings WHERE user_id = ? AND course_id = ?",
        (user_id, course_id),
    )?;
    Ok(removed)
}
