use crate::db::now_rfc3339;
use crate::error::{LmsError, LmsResult};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

pub const USER_MANAGE: &str = "user.manage";
pub const COURSE_MANAGE: &str = "course.manage";
pub const REPORT_VIEW: &str = "report.view";
pub const ASSIGNMENT_GRADE: &str = "assignment.grade";
pub const RATING_MANAGE: &str = "rating.manage";
pub const COMMISSION_MANAGE: &str = "commission.manage";
pub const WITHDRAWAL_MANAGE: &str = "withdrawal.manage";
pub const REFUND_MANAGE: &str = "refund.manage";
pub const CERTIFICATE_MANAGE: &str = "certificate.manage";
pub const SETTING_MANAGE: &str = "setting.manage";

pub const ALL_PERMISSIONS: [&str; 10] = [
    USER_MANAGE,
    COURSE_MANAGE,
    REPORT_VIEW,
    ASSIGNMENT_GRADE,
    RATING_MANAGE,
    COMMISSION_MANAGE,
    WITHDRAWAL_MANAGE,
    REFUND_MANAGE,
    CERTIFICATE_MANAGE,
    SETTING_MANAGE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Student,
    Instructor,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Self::Student),
            "instructor" => Some(Self::Instructor),
            "admin" => Some(Self::Admin),
            "super_admin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Instructor => "instructor",
            Self::Admin => "admin",
            Self::SuperAdmin => "super_admin",
        }
    }
}

pub fn is_known_permission(permission: &str) -> bool {
    ALL_PERMISSIONS.contains(&permission)
}

fn user_role(conn: &Connection, user_id: &str) -> LmsResult<Option<Role>> {
    let role: Option<String> = conn
        .query_row("SELECT role FROM users WHERE id = ?", [user_id], |r| r.get(0))
        .optional()?;
    Ok(role.as_deref().and_then(Role::parse))
}

pub fn effective_permissions(conn: &Connection, user_id: &str) -> LmsResult<BTreeSet<String>> {
    let Some(role) = user_role(conn, user_id)? else {
        return Err(LmsError::NotFound("user"));
    };
    match role {
        Role::SuperAdmin => Ok(ALL_PERMISSIONS.iter().map(|p| p.to_string()).collect()),
        Role::Admin => {
            let mut stmt =
                conn.prepare("SELECT permission FROM user_permissions WHERE user_id = ?")?;
            let perms = stmt
                .query_map([user_id], |r| r.get::<_, String>(0))?
                .collect::<Result<BTreeSet<_>, _>>()?;
            Ok(perms)
        }
        Role::Student | Role::Instructor => Ok(BTreeSet::new()),
    }
}

/// Resolve the acting admin and check one permission string.
/// Returns the actor id so handlers can log who performed the call.
pub fn require_permission<'a>(
    conn: &Connection,
    actor: Option<&'a str>,
    permission: &str,
) -> LmsResult<&'a str> {
    let Some(actor) = actor.map(str::trim).filter(|a| !a.is_empty()) else {
        return Err(LmsError::Unauthorized("missing actor".to_string()));
    };
    let perms = match effective_permissions(conn, actor) {
        Ok(p) => p,
        Err(LmsError::NotFound(_)) => {
            return Err(LmsError::Unauthorized("unknown actor".to_string()))
        }
        Err(e) => return Err(e),
    };
    if !perms.contains(permission) {
        tracing::warn!(actor, permission, "permission denied");
        return Err(LmsError::Forbidden(permission.to_string()));
    }
    Ok(actor)
}

pub fn insert_user(conn: &Connection, name: &str, email: &str, role: Role) -> LmsResult<String> {
    let name = name.trim();
    let email = email.trim().to_ascii_lowercase();
    if name.is_empty() {
        return Err(LmsError::bad_params("name must not be empty"));
    }
    if !email.contains('@') {
        return Err(LmsError::bad_params("email is not valid"));
    }
    let taken: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE email = ?", [&email], |r| r.get(0))
        .optional()?;
    if taken.is_some() {
        return Err(LmsError::bad_params("email already in use"));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO users(id, name, email, role, created_at) VALUES(?, ?, ?, ?, ?)",
        (&id, name, &email, role.as_str(), now_rfc3339()),
    )?;
    Ok(id)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

pub fn list_users(
    conn: &Connection,
    role: Option<Role>,
    limit: i64,
    offset: i64,
) -> LmsResult<Vec<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, role, created_at
         FROM users
         WHERE (?1 IS NULL OR role = ?1)
         ORDER BY name COLLATE NOCASE, id
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt
        .query_map((role.map(Role::as_str), limit, offset), |r| {
            Ok(UserRow {
                id: r.get(0)?,
                name: r.get(1)?,
                email: r.get(2)?,
                role: r.get(3)?,
                created_at: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Create the first super admin. Refused once any super admin exists.
pub fn bootstrap(conn: &Connection, name: &str, email: &str) -> LmsResult<String> {
    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE role = 'super_admin'",
        [],
        |r| r.get(0),
    )?;
    if existing > 0 {
        return Err(LmsError::invalid_state("workspace already has a super admin"));
    }
    let id = insert_user(conn, name, email, Role::SuperAdmin)?;
    tracing::info!(user_id = %id, "bootstrapped super admin");
    Ok(id)
}

fn require_admin_target(conn: &Connection, user_id: &str) -> LmsResult<()> {
    match user_role(conn, user_id)? {
        None => Err(LmsError::NotFound("user")),
        Some(Role::Admin) => Ok(()),
        Some(_) => Err(LmsError::invalid_state(
            "permissions can only be granted to admin users",
        )),
    }
}

pub fn grant(conn: &Connection, user_id: &str, permission: &str) -> LmsResult<()> {
    if !is_known_permission(permission) {
        return Err(LmsError::bad_params(format!(
            "unknown permission: {}",
            permission
        )));
    }
    require_admin_target(conn, user_id)?;
    conn.execute(
        "INSERT OR IGNORE INTO user_permissions(user_id, permission) VALUES(?, ?)",
        (user_id, permission),
    )?;
    Ok(())
}

pub fn revoke(conn: &Connection, user_id: &str, permission: &str) -> LmsResult<()> {
    require_admin_target(conn, user_id)?;
    conn.execute(
        "DELETE FROM user_permissions WHERE user_id = ? AND permission = ?",
        (user_id, permission),
    )?;
    Ok(())
}
