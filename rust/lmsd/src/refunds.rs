use crate::db::now_rfc3339;
use crate::error::{LmsError, LmsResult};
use crate::wallet::{post_entry, Direction, EntryType, LedgerEntry};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: String,
    pub processed_at: Option<String>,
}

fn refund_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Refund> {
    Ok(Refund {
        id: r.get(0)?,
        order_id: r.get(1)?,
        user_id: r.get(2)?,
        amount_cents: r.get(3)?,
        reason: r.get(4)?,
        status: r.get(5)?,
        created_at: r.get(6)?,
        processed_at: r.get(7)?,
    })
}

fn load_refund(conn: &Connection, refund_id: &str) -> LmsResult<Refund> {
    conn.query_row(
        "SELECT id, order_id, user_id, amount_cents, reason, status, created_at, processed_at
         FROM refunds WHERE id = ?",
        [refund_id],
        refund_from_row,
    )
    .optional()?
    .ok_or(LmsError::NotFound("refund"))
}

/// Open a refund request for a completed order. The full order total is
/// refunded in default-currency units, since that is what the wallet holds.
/// Only one open or approved refund may exist per order.
pub fn request_refund(conn: &Connection, order_id: &str, reason: Option<&str>) -> LmsResult<Refund> {
    let order: Option<(String, String, i64)> = conn
        .query_row(
            "SELECT user_id, status, base_total_cents FROM orders WHERE id = ?",
            [order_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let Some((user_id, status, base_total_cents)) = order else {
        return Err(LmsError::NotFound("order"));
    };
    if status != "completed" {
        return Err(LmsError::invalid_state(format!(
            "order is {}, only completed orders can be refunded",
            status
        )));
    }
    let open: i64 = conn.query_row(
        "SELECT COUNT(*) FROM refunds WHERE order_id = ? AND status IN ('pending', 'approved')",
        [order_id],
        |r| r.get(0),
    )?;
    if open > 0 {
        return Err(LmsError::invalid_state("order already has a refund request"));
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO refunds(id, order_id, user_id, amount_cents, reason, status, created_at)
         VALUES(?, ?, ?, ?, ?, 'pending', ?)",
        (&id, order_id, &user_id, base_total_cents, reason, now_rfc3339()),
    )?;
    load_refund(conn, &id)
}

/// Approve a pending refund: the order becomes `refunded` (dropping out of
/// the enrollment cohort) and the amount is credited to the buyer's wallet.
pub fn approve_refund(conn: &Connection, refund_id: &str) -> LmsResult<Refund> {
    let refund = load_refund(conn, refund_id)?;
    if refund.status != "pending" {
        return Err(LmsError::invalid_state(format!(
            "refund is already {}",
            refund.status
        )));
    }
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        "UPDATE refunds SET status = 'approved', processed_at = ? WHERE id = ? AND status = 'pending'",
        (now_rfc3339(), refund_id),
    )?;
    if changed == 0 {
        return Err(LmsError::invalid_state("refund is no longer pending"));
    }
    tx.execute(
        "UPDATE orders SET status = 'refunded' WHERE id = ?",
        [&refund.order_id],
    )?;
    tx.execute(
        "UPDATE commissions SET status = 'rejected' WHERE order_id = ? AND status IN ('pending', 'approved')",
        [&refund.order_id],
    )?;
    if refund.amount_cents > 0 {
        post_entry(
            &tx,
            &LedgerEntry {
                user_id: &refund.user_id,
                amount_cents: refund.amount_cents,
                direction: Direction::Credit,
                entry_type: EntryType::Admin,
                reference_type: Some("refund"),
                reference_id: Some(refund_id),
                note: Some("refund approved"),
            },
        )?;
    }
    tx.commit()?;
    tracing::info!(refund_id, amount_cents = refund.amount_cents, "refund approved");
    load_refund(conn, refund_id)
}

pub fn reject_refund(conn: &Connection, refund_id: &str) -> LmsResult<Refund> {
    let refund = load_refund(conn, refund_id)?;
    if refund.status != "pending" {
        return Err(LmsError::invalid_state(format!(
            "refund is already {}",
            refund.status
        )));
    }
    conn.execute(
        "UPDATE refunds SET status = 'rejected', processed_at = ? WHERE id = ? AND status = 'pending'",
        (now_rfc3339(), refund_id),
    )?;
    tracing::info!(refund_id, "refund rejected");
    load_refund(conn, refund_id)
}

pub fn list_refunds(
    conn: &Connection,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> LmsResult<Vec<Refund>> {
    let mut stmt = conn.prepare(
        "SELECT id, order_id, user_id, amount_cents, reason, status, created_at, processed_at
         FROM refunds
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY created_at DESC, id
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt
        .query_map((status, limit, offset), refund_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
