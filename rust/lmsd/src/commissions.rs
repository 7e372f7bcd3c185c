use crate::currency::apply_rate;
use crate::db::now_rfc3339;
use crate::error::{LmsError, LmsResult};
use crate::orders::order_status;
use crate::wallet::{post_entry, Direction, EntryType, LedgerEntry};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionStats {
    pub total_count: i64,
    pub total_cents: i64,
    pub pending_count: i64,
    pub pending_cents: i64,
    pub approved_count: i64,
    pub approved_cents: i64,
    pub paid_count: i64,
    pub paid_cents: i64,
    pub rejected_count: i64,
    pub rejected_cents: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub affiliate_id: String,
    pub commission_count: i64,
    pub amount_cents: i64,
    pub balance_cents: i64,
}

/// Record a pending commission on a completed order. Without an explicit
/// amount the commission is `rate_percent` of the order's default-currency
/// total, the unit the wallet pays out in.
pub fn create_commission(
    conn: &Connection,
    affiliate_id: &str,
    order_id: &str,
    amount_cents: Option<i64>,
    rate_percent: i64,
) -> LmsResult<String> {
    if matches!(amount_cents, Some(a) if a <= 0) {
        return Err(LmsError::bad_params("amountCents must be positive"));
    }
    let affiliate: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [affiliate_id], |r| {
            r.get(0)
        })
        .optional()?;
    if affiliate.is_none() {
        return Err(LmsError::NotFound("affiliate"));
    }
    match order_status(conn, order_id)?.as_deref() {
        None => return Err(LmsError::NotFound("order")),
        Some("completed") => {}
        Some(other) => {
            return Err(LmsError::invalid_state(format!(
                "order is {}, commissions need a completed order",
                other
            )))
        }
    }
    let amount_cents = match amount_cents {
        Some(a) => a,
        None => {
            let total: i64 = conn.query_row(
                "SELECT base_total_cents FROM orders WHERE id = ?",
                [order_id],
                |r| r.get(0),
            )?;
            apply_rate(total, rate_percent as f64 / 100.0)
        }
    };
    if amount_cents <= 0 {
        return Err(LmsError::invalid_state("computed commission is zero"));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO commissions(id, affiliate_id, order_id, amount_cents, status, created_at)
         VALUES(?, ?, ?, ?, 'pending', ?)",
        (&id, affiliate_id, order_id, amount_cents, now_rfc3339()),
    )?;
    Ok(id)
}

/// Moderate a pending commission to `approved` or `rejected`.
pub fn update_status(conn: &Connection, commission_id: &str, status: &str) -> LmsResult<()> {
    if !matches!(status, "approved" | "rejected") {
        return Err(LmsError::bad_params("status must be approved or rejected"));
    }
    let current: Option<String> = conn
        .query_row(
            "SELECT status FROM commissions WHERE id = ?",
            [commission_id],
            |r| r.get(0),
        )
        .optional()?;
    match current.as_deref() {
        None => Err(LmsError::NotFound("commission")),
        Some("pending") => {
            conn.execute(
                "UPDATE commissions SET status = ? WHERE id = ? AND status = 'pending'",
                (status, commission_id),
            )?;
            Ok(())
        }
        Some(other) => Err(LmsError::invalid_state(format!(
            "commission is already {}",
            other
        ))),
    }
}

/// Count and sum per status in a single pass over `commissions`.
pub fn commission_stats(conn: &Connection, affiliate_id: Option<&str>) -> LmsResult<CommissionStats> {
    Ok(conn.query_row(
        "SELECT
           COUNT(*),
           COALESCE(SUM(amount_cents), 0),
           COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN status = 'pending' THEN amount_cents ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN status = 'approved' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN status = 'approved' THEN amount_cents ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN status = 'paid' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN status = 'paid' THEN amount_cents ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN status = 'rejected' THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN status = 'rejected' THEN amount_cents ELSE 0 END), 0)
         FROM commissions
         WHERE (?1 IS NULL OR affiliate_id = ?1)",
        [affiliate_id],
        |r| {
            Ok(CommissionStats {
                total_count: r.get(0)?,
                total_cents: r.get(1)?,
                pending_count: r.get(2)?,
                pending_cents: r.get(3)?,
                approved_count: r.get(4)?,
                approved_cents: r.get(5)?,
                paid_count: r.get(6)?,
                paid_cents: r.get(7)?,
                rejected_count: r.get(8)?,
                rejected_cents: r.get(9)?,
            })
        },
    )?)
}

fn hold_cutoff(hold_days: i64) -> String {
    (chrono::Utc::now() - chrono::Duration::days(hold_days.max(0)))
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Pay out the approved commissions of one affiliate that are older than
/// `hold_days`: mark them paid and credit the sum to the affiliate's wallet
/// in one transaction.
pub fn payout(conn: &Connection, affiliate_id: &str, hold_days: i64) -> LmsResult<Payout> {
    let cutoff = hold_cutoff(hold_days);
    let tx = conn.unchecked_transaction()?;
    let (count, amount): (i64, i64) = tx.query_row(
        "SELECT COUNT(*), COALESCE(SUM(amount_cents), 0)
         FROM commissions
         WHERE affiliate_id = ? AND status = 'approved' AND created_at <= ?",
        (affiliate_id, &cutoff),
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    if count == 0 {
        return Err(LmsError::invalid_state("no approved commissions to pay out"));
    }
    let now = now_rfc3339();
    tx.execute(
        "UPDATE commissions SET status = 'paid', paid_at = ?
         WHERE affiliate_id = ? AND status = 'approved' AND created_at <= ?",
        (&now, affiliate_id, &cutoff),
    )?;
    let balance_cents = post_entry(
        &tx,
        &LedgerEntry {
            user_id: affiliate_id,
            amount_cents: amount,
            direction: Direction::Credit,
            entry_type: EntryType::Admin,
            reference_type: Some("commission_payout"),
            reference_id: None,
            note: Some("affiliate commission payout"),
        },
    )?;
    tx.commit()?;
    tracing::info!(affiliate_id, count, amount, "commission payout");
    Ok(Payout {
        affiliate_id: affiliate_id.to_string(),
        commission_count: count,
        amount_cents: amount,
        balance_cents,
    })
}
