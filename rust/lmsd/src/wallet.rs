//! Wallet ledger and withdrawal workflow.
//!
//! `wallets.balance_cents` is always moved together with a `wallet_transactions`
//! row inside the caller's transaction, so the ledger sum equals the balance.

use crate::db::now_rfc3339;
use crate::error::{LmsError, LmsResult};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }
}

/// Which side produced a ledger row: the wallet owner (`User`) or the back office (`Admin`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    User,
    Admin,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::User => "user",
            EntryType::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerEntry<'a> {
    pub user_id: &'a str,
    pub amount_cents: i64,
    pub direction: Direction,
    pub entry_type: EntryType,
    pub reference_type: Option<&'a str>,
    pub reference_id: Option<&'a str>,
    pub note: Option<&'a str>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: String,
    pub amount_cents: i64,
    pub direction: String,
    pub entry_type: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: String,
    pub user_id: String,
    pub amount_cents: i64,
    pub status: String,
    pub note: Option<String>,
    pub created_at: String,
    pub processed_at: Option<String>,
}

pub fn balance(conn: &Connection, user_id: &str) -> LmsResult<i64> {
    let b: Option<i64> = conn
        .query_row(
            "SELECT balance_cents FROM wallets WHERE user_id = ?",
            [user_id],
            |r| r.get(0),
        )
        .optional()?;
    Ok(b.unwrap_or(0))
}

/// Apply one ledger entry. Must run inside the caller's transaction.
pub fn post_entry(conn: &Connection, entry: &LedgerEntry<'_>) -> LmsResult<i64> {
    if entry.amount_cents <= 0 {
        return Err(LmsError::bad_params("amount must be positive"));
    }
    let current = balance(conn, entry.user_id)?;
    let next = match entry.direction {
        Direction::Credit => current.checked_add(entry.amount_cents).ok_or_else(|| {
            LmsError::invalid_state(format!(
                "credit of {} would overflow balance {}",
                entry.amount_cents, current
            ))
        })?,
        Direction::Debit => {
            if current < entry.amount_cents {
                return Err(LmsError::InsufficientFunds {
                    balance_cents: current,
                    requested_cents: entry.amount_cents,
                });
            }
            current - entry.amount_cents
        }
    };
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO wallets(user_id, balance_cents, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET
           balance_cents = excluded.balance_cents,
           updated_at = excluded.updated_at",
        (entry.user_id, next, &now),
    )?;
    conn.execute(
        "INSERT INTO wallet_transactions(
            id, user_id, amount_cents, direction, entry_type, reference_type, reference_id, note, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            Uuid::new_v4().to_string(),
            entry.user_id,
            entry.amount_cents,
            entry.direction.as_str(),
            entry.entry_type.as_str(),
            entry.reference_type,
            entry.reference_id,
            entry.note,
            &now,
        ),
    )?;
    Ok(next)
}

pub fn ledger(
    conn: &Connection,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> LmsResult<Vec<WalletTransaction>> {
    let mut stmt = conn.prepare(
        "SELECT id, amount_cents, direction, entry_type, reference_type, reference_id, note, created_at
         FROM wallet_transactions
         WHERE user_id = ?
         ORDER BY created_at DESC, rowid DESC
         LIMIT ? OFFSET ?",
    )?;
    let rows = stmt
        .query_map((user_id, limit, offset), |r| {
            Ok(WalletTransaction {
                id: r.get(0)?,
                amount_cents: r.get(1)?,
                direction: r.get(2)?,
                entry_type: r.get(3)?,
                reference_type: r.get(4)?,
                reference_id: r.get(5)?,
                note: r.get(6)?,
                created_at: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn require_user(conn: &Connection, user_id: &str) -> LmsResult<()> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [user_id], |r| r.get(0))
        .optional()?;
    found.map(|_| ()).ok_or(LmsError::NotFound("user"))
}

/// Manual back-office adjustment.
pub fn adjust(
    conn: &Connection,
    user_id: &str,
    amount_cents: i64,
    direction: Direction,
    note: Option<&str>,
) -> LmsResult<i64> {
    require_user(conn, user_id)?;
    let tx = conn.unchecked_transaction()?;
    let next = post_entry(
        &tx,
        &LedgerEntry {
            user_id,
            amount_cents,
            direction,
            entry_type: EntryType::Admin,
            reference_type: Some("adjustment"),
            reference_id: None,
            note,
        },
    )?;
    tx.commit()?;
    Ok(next)
}

fn load_withdrawal(conn: &Connection, withdrawal_id: &str) -> LmsResult<Withdrawal> {
    conn.query_row(
        "SELECT id, user_id, amount_cents, status, note, created_at, processed_at
         FROM withdrawals WHERE id = ?",
        [withdrawal_id],
        |r| {
            Ok(Withdrawal {
                id: r.get(0)?,
                user_id: r.get(1)?,
                amount_cents: r.get(2)?,
                status: r.get(3)?,
                note: r.get(4)?,
                created_at: r.get(5)?,
                processed_at: r.get(6)?,
            })
        },
    )
    .optional()?
    .ok_or(LmsError::NotFound("withdrawal"))
}

/// File a withdrawal request. The amount leaves the wallet immediately and is
/// held until the request is approved or rejected.
pub fn request_withdrawal(
    conn: &Connection,
    user_id: &str,
    amount_cents: i64,
    min_withdrawal_cents: i64,
    note: Option<&str>,
) -> LmsResult<Withdrawal> {
    if amount_cents <= 0 {
        return Err(LmsError::bad_params("amountCents must be positive"));
    }
    if amount_cents < min_withdrawal_cents {
        return Err(LmsError::bad_params(format!(
            "amountCents must be at least {}",
            min_withdrawal_cents
        )));
    }
    require_user(conn, user_id)?;

    let id = Uuid::new_v4().to_string();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO withdrawals(id, user_id, amount_cents, status, note, created_at)
         VALUES(?, ?, ?, 'pending', ?, ?)",
        (&id, user_id, amount_cents, note, now_rfc3339()),
    )?;
    post_entry(
        &tx,
        &LedgerEntry {
            user_id,
            amount_cents,
            direction: Direction::Debit,
            entry_type: EntryType::User,
            reference_type: Some("withdrawal"),
            reference_id: Some(&id),
            note: Some("withdrawal requested"),
        },
    )?;
    tx.commit()?;
    tracing::info!(withdrawal_id = %id, user_id, amount_cents, "withdrawal requested");
    load_withdrawal(conn, &id)
}

/// Move a pending withdrawal to `approved`. Funds were already held on request.
pub fn approve_withdrawal(conn: &Connection, withdrawal_id: &str) -> LmsResult<Withdrawal> {
    let w = load_withdrawal(conn, withdrawal_id)?;
    if w.status != "pending" {
        return Err(LmsError::invalid_state(format!(
            "withdrawal is already {}",
            w.status
        )));
    }
    let changed = conn.execute(
        "UPDATE withdrawals SET status = 'approved', processed_at = ?
         WHERE id = ? AND status = 'pending'",
        (now_rfc3339(), withdrawal_id),
    )?;
    if changed == 0 {
        return Err(LmsError::invalid_state("withdrawal is no longer pending"));
    }
    tracing::info!(withdrawal_id, "withdrawal approved");
    load_withdrawal(conn, withdrawal_id)
}

/// Reject a pending withdrawal and return the held amount to the wallet.
/// The status guard and the credit share one transaction, so a withdrawal is
/// credited back at most once.
pub fn reject_withdrawal(
    conn: &Connection,
    withdrawal_id: &str,
    note: Option<&str>,
) -> LmsResult<Withdrawal> {
    let w = load_withdrawal(conn, withdrawal_id)?;
    if w.status != "pending" {
        return Err(LmsError::invalid_state(format!(
            "withdrawal is already {}",
            w.status
        )));
    }
    let tx = conn.unchecked_transaction()?;
    let changed = tx.execute(
        "UPDATE withdrawals SET status = 'rejected', processed_at = ?, note = COALESCE(?, note)
         WHERE id = ? AND status = 'pending'",
        (now_rfc3339(), note, withdrawal_id),
    )?;
    if changed == 0 {
        return Err(LmsError::invalid_state("withdrawal is no longer pending"));
    }
    post_entry(
        &tx,
        &LedgerEntry {
            user_id: &w.user_id,
            amount_cents: w.amount_cents,
            direction: Direction::Credit,
            entry_type: EntryType::Admin,
            reference_type: Some("withdrawal"),
            reference_id: Some(withdrawal_id),
            note: Some("withdrawal rejected"),
        },
    )?;
    tx.commit()?;
    tracing::info!(withdrawal_id, amount_cents = w.amount_cents, "withdrawal rejected");
    load_withdrawal(conn, withdrawal_id)
}

pub fn list_withdrawals(
    conn: &Connection,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> LmsResult<Vec<Withdrawal>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, amount_cents, status, note, created_at, processed_at
         FROM withdrawals
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY created_at DESC, id
         LIMIT ?2 OFFSET ?3",
    )?;
    let rows = stmt
        .query_map((status, limit, offset), |r| {
            Ok(Withdrawal {
                id: r.get(0)?,
                user_id: r.get(1)?,
                amount_cents: r.get(2)?,
                status: r.get(3)?,
                note: r.get(4)?,
                created_at: r.get(5)?,
                processed_at: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
