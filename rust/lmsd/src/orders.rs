use crate::currency::apply_rate;
use crate::db::now_rfc3339;
use crate::error::{LmsError, LmsResult};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: String,
    pub total_cents: i64,
    pub currency: String,
    pub base_total_cents: i64,
    pub rate_per_default: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub user_id: String,
    pub user_name: Option<String>,
    pub course_id: String,
    pub course_title: Option<String>,
}

pub fn order_status(conn: &Connection, order_id: &str) -> LmsResult<Option<String>> {
    Ok(conn
        .query_row("SELECT status FROM orders WHERE id = ?", [order_id], |r| {
            r.get(0)
        })
        .optional()?)
}

/// Create a pending order for `course_ids`, priced at the courses' current
/// prices converted with `rate` into `currency`. The default-currency total
/// and the rate are kept on the order for refunds and commissions.
pub fn create_order(
    conn: &Connection,
    user_id: &str,
    course_ids: &[String],
    currency: &str,
    rate: f64,
) -> LmsResult<OrderSummary> {
    if course_ids.is_empty() {
        return Err(LmsError::bad_params("courseIds must not be empty"));
    }
    let user: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| r.get(0))
        .optional()?;
    if user.is_none() {
        return Err(LmsError::NotFound("user"));
    }

    let mut seen = HashSet::new();
    let mut lines = Vec::new();
    for course_id in course_ids {
        if !seen.insert(course_id.as_str()) {
            continue;
        }
        let price: Option<i64> = conn
            .query_row(
                "SELECT price_cents FROM courses WHERE id = ?",
                [course_id],
                |r| r.get(0),
            )
            .optional()?;
        let Some(price) = price else {
            return Err(LmsError::NotFound("course"));
        };
        lines.push((course_id.clone(), price, apply_rate(price, rate)));
    }
    let base_total = sum_cents(lines.iter().map(|(_, base, _)| *base))?;
    let total = sum_cents(lines.iter().map(|(_, _, converted)| *converted))?;

    let order_id = Uuid::new_v4().to_string();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO orders(
            id, user_id, status, total_cents, currency, base_total_cents, rate_per_default, created_at
         ) VALUES(?, ?, 'pending', ?, ?, ?, ?, ?)",
        (&order_id, user_id, total, currency, base_total, rate, now_rfc3339()),
    )?;
    for (course_id, _, price) in &lines {
        tx.execute(
            "INSERT INTO order_items(id, order_id, course_id, price_cents) VALUES(?, ?, ?, ?)",
            (Uuid::new_v4().to_string(), &order_id, course_id, price),
        )?;
    }
    tx.commit()?;

    Ok(OrderSummary {
        order_id,
        total_cents: total,
        currency: currency.to_string(),
        base_total_cents: base_total,
        rate_per_default: rate,
        status: "pending".to_string(),
    })
}

fn sum_cents(mut amounts: impl Iterator<Item = i64>) -> LmsResult<i64> {
    amounts
        .try_fold(0i64, |acc, a| acc.checked_add(a))
        .ok_or_else(|| LmsError::bad_params("order total is out of range"))
}

pub fn complete_order(conn: &Connection, order_id: &str) -> LmsResult<()> {
    match order_status(conn, order_id)?.as_deref() {
        None => Err(LmsError::NotFound("order")),
        Some("pending") => {
            conn.execute(
                "UPDATE orders SET status = 'completed', completed_at = ? WHERE id = ? AND status = 'pending'",
                (now_rfc3339(), order_id),
            )?;
            tracing::info!(order_id, "order completed");
            Ok(())
        }
        Some(other) => Err(LmsError::invalid_state(format!(
            "order is {}, only pending orders can be completed",
            other
        ))),
    }
}

pub fn cancel_order(conn: &Connection, order_id: &str) -> LmsResult<()> {
    match order_status(conn, order_id)?.as_deref() {
        None => Err(LmsError::NotFound("order")),
        Some("pending") => {
            conn.execute(
                "UPDATE orders SET status = 'cancelled' WHERE id = ? AND status = 'pending'",
                [order_id],
            )?;
            Ok(())
        }
        Some(other) => Err(LmsError::invalid_state(format!(
            "order is {}, only pending orders can be cancelled",
            other
        ))),
    }
}

/// Enrollments are not stored: they are the distinct (user, course) pairs of
/// completed orders.
pub fn list_enrollments(conn: &Connection, course_id: Option<&str>) -> LmsResult<Vec<Enrollment>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT o.user_id, u.name, oi.course_id, c.title
         FROM orders o
         JOIN order_items oi ON oi.order_id = o.id
         LEFT JOIN users u ON u.id = o.user_id
         LEFT JOIN courses c ON c.id = oi.course_id
         WHERE o.status = 'completed' AND (?1 IS NULL OR oi.course_id = ?1)
         ORDER BY oi.course_id, o.user_id",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok(Enrollment {
                user_id: r.get(0)?,
                user_name: r.get(1)?,
                course_id: r.get(2)?,
                course_title: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
