use crate::db::now_rfc3339;
use crate::error::{LmsError, LmsResult};
use crate::progress::{compute_course_progress, ProgressStatus};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub code: String,
    pub issued_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub valid: bool,
    pub certificate: Option<Certificate>,
    pub user_name: Option<String>,
    pub course_title: Option<String>,
}

/// `<prefix>-<first 16 hex chars of sha256(user|course|issued_at)>`, uppercased.
pub fn verification_code(prefix: &str, user_id: &str, course_id: &str, issued_at: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update(b"|");
    hasher.update(course_id.as_bytes());
    hasher.update(b"|");
    hasher.update(issued_at.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", prefix, &digest[..16]).to_ascii_uppercase()
}

fn find(conn: &Connection, user_id: &str, course_id: &str) -> LmsResult<Option<Certificate>> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, course_id, code, issued_at
             FROM certificates WHERE user_id = ? AND course_id = ?",
            (user_id, course_id),
            |r| {
                Ok(Certificate {
                    id: r.get(0)?,
                    user_id: r.get(1)?,
                    course_id: r.get(2)?,
                    code: r.get(3)?,
                    issued_at: r.get(4)?,
                })
            },
        )
        .optional()?)
}

/// Issue the course certificate for a learner at 100 % progress. Issuing
/// twice returns the certificate from the first call.
pub fn issue(
    conn: &Connection,
    prefix: &str,
    user_id: &str,
    course_id: &str,
) -> LmsResult<(Certificate, bool)> {
    if let Some(existing) = find(conn, user_id, course_id)? {
        return Ok((existing, false));
    }
    let user: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| r.get(0))
        .optional()?;
    if user.is_none() {
        return Err(LmsError::NotFound("user"));
    }
    let progress = compute_course_progress(conn, user_id, course_id)?;
    if !progress.course_found {
        return Err(LmsError::NotFound("course"));
    }
    if progress.status != ProgressStatus::Completed {
        return Err(LmsError::NotCompleted {
            progress_percentage: progress.progress_percentage,
        });
    }

    let issued_at = now_rfc3339();
    let cert = Certificate {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        course_id: course_id.to_string(),
        code: verification_code(prefix, user_id, course_id, &issued_at),
        issued_at,
    };
    conn.execute(
        "INSERT INTO certificates(id, user_id, course_id, code, issued_at) VALUES(?, ?, ?, ?, ?)",
        (&cert.id, &cert.user_id, &cert.course_id, &cert.code, &cert.issued_at),
    )?;
    tracing::info!(user_id, course_id, code = %cert.code, "certificate issued");
    Ok((cert, true))
}

pub fn verify(conn: &Connection, code: &str) -> LmsResult<Verification> {
    let code = code.trim().to_ascii_uppercase();
    let row = conn
        .query_row(
            "SELECT c.id, c.user_id, c.course_id, c.code, c.issued_at, u.name, co.title
             FROM certificates c
             LEFT JOIN users u ON u.id = c.user_id
             LEFT JOIN courses co ON co.id = c.course_id
             WHERE c.code = ?",
            [&code],
            |r| {
                Ok((
                    Certificate {
                        id: r.get(0)?,
                        user_id: r.get(1)?,
                        course_id: r.get(2)?,
                        code: r.get(3)?,
                        issued_at: r.get(4)?,
                    },
                    r.get::<_, Option<String>>(5)?,
                    r.get::<_, Option<String>>(6)?,
                ))
            },
        )
        .optional()?;
    Ok(match row {
        Some((cert, user_name, course_title)) => Verification {
            valid: true,
            certificate: Some(cert),
            user_name,
            course_title,
        },
        None => Verification {
            valid: false,
            certificate: None,
            user_name: None,
            course_title: None,
        },
    })
}
