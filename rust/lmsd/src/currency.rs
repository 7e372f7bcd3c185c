use crate::error::{LmsError, LmsResult};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub code: String,
    pub symbol: String,
    pub rate_per_default: f64,
    pub is_default: bool,
}

pub fn normalize_code(raw: &str) -> LmsResult<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(LmsError::bad_params("currency code must be 3 letters"));
    }
    Ok(code)
}

/// Convert an amount in default-currency minor units, rounding half away from zero.
pub fn apply_rate(amount_cents: i64, rate: f64) -> i64 {
    (amount_cents as f64 * rate).round() as i64
}

pub fn upsert(
    conn: &Connection,
    code: &str,
    symbol: &str,
    rate_per_default: f64,
    is_default: bool,
) -> LmsResult<()> {
    let code = normalize_code(code)?;
    if !rate_per_default.is_finite() || rate_per_default <= 0.0 {
        return Err(LmsError::bad_params("rate must be a positive number"));
    }
    if is_default && rate_per_default != 1.0 {
        return Err(LmsError::bad_params("the default currency must have rate 1"));
    }
    let tx = conn.unchecked_transaction()?;
    if is_default {
        tx.execute("UPDATE currencies SET is_default = 0", [])?;
    }
    tx.execute(
        "INSERT INTO currencies(code, symbol, rate_per_default, is_default) VALUES(?, ?, ?, ?)
         ON CONFLICT(code) DO UPDATE SET
           symbol = excluded.symbol,
           rate_per_default = excluded.rate_per_default,
           is_default = excluded.is_default",
        (&code, symbol.trim(), rate_per_default, is_default as i64),
    )?;
    tx.commit()?;
    Ok(())
}

pub fn list(conn: &Connection) -> LmsResult<Vec<Currency>> {
    let mut stmt = conn.prepare(
        "SELECT code, symbol, rate_per_default, is_default
         FROM currencies
         ORDER BY is_default DESC, code",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Currency {
                code: r.get(0)?,
                symbol: r.get(1)?,
                rate_per_default: r.get(2)?,
                is_default: r.get::<_, i64>(3)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Rate from the default currency to `code`. The configured default currency
/// always converts at 1 even before it is registered in the table.
pub fn rate_for(conn: &Connection, code: &str, default_code: &str) -> LmsResult<f64> {
    let code = normalize_code(code)?;
    let rate: Option<f64> = conn
        .query_row(
            "SELECT rate_per_default FROM currencies WHERE code = ?",
            [&code],
            |r| r.get(0),
        )
        .optional()?;
    match rate {
        Some(r) => Ok(r),
        None if code.eq_ignore_ascii_case(default_code) => Ok(1.0),
        None => Err(LmsError::NotFound("currency")),
    }
}

pub fn convert(
    conn: &Connection,
    amount_cents: i64,
    to: &str,
    default_code: &str,
) -> LmsResult<i64> {
    let rate = rate_for(conn, to, default_code)?;
    Ok(apply_rate(amount_cents, rate))
}
