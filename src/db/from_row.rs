//! Row mapping trait and helpers for reducing boilerplate in queries.
//!
//! This module provides a `FromRow` trait that models can implement to
//! define how they are constructed from database rows, plus helper functions
//! for common query patterns.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Parse a string column into an enum via its `from_str`, converting parse
/// failures to rusqlite errors instead of panicking on corrupt rows.
fn parse_enum<T>(
    row: &Row,
    col: usize,
    col_name: &str,
    from_str: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(col)?;
    from_str(&raw).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(col, col_name.to_string(), rusqlite::types::Type::Text)
    })
}

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ============ SQL SELECT Constants ============

pub const ENTITLEMENT_COLS: &str =
    "email, purchased, purchased_at, subscription_status, refunded_at, created_at, updated_at";

pub const PENDING_TRANSACTION_COLS: &str =
    "token, email, product, amount_cents, discount_code, status, created_at, completed_at";

pub const DISCOUNT_CODE_COLS: &str =
    "code, email, discount_percent, expires_at, used_at, created_at";

pub const TRANSACTION_RECORD_COLS: &str = "id, email, product, amount_cents, currency, status, transaction_id, discount_code, source, created_at";

// ============ FromRow Implementations ============

impl FromRow for Entitlement {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Entitlement {
            email: row.get(0)?,
            purchased: row.get::<_, i32>(1)? != 0,
            purchased_at: row.get(2)?,
            subscription_status: parse_enum(
                row,
                3,
                "subscription_status",
                SubscriptionStatus::from_str,
            )?,
            refunded_at: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl FromRow for PendingTransaction {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(PendingTransaction {
            token: row.get(0)?,
            email: row.get(1)?,
            product: parse_enum(row, 2, "product", ProductKind::from_str)?,
            amount_cents: row.get(3)?,
            discount_code: row.get(4)?,
            status: parse_enum(row, 5, "status", PendingStatus::from_str)?,
            created_at: row.get(6)?,
            completed_at: row.get(7)?,
        })
    }
}

impl FromRow for DiscountCode {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(DiscountCode {
            code: row.get(0)?,
            email: row.get(1)?,
            discount_percent: row.get(2)?,
            expires_at: row.get(3)?,
            used_at: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl FromRow for TransactionRecord {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(TransactionRecord {
            id: row.get(0)?,
            email: row.get(1)?,
            product: parse_enum(row, 2, "product", ProductKind::from_str)?,
            amount_cents: row.get(3)?,
            currency: row.get(4)?,
            status: row.get(5)?,
            transaction_id: row.get(6)?,
            discount_code: row.get(7)?,
            source: parse_enum(row, 8, "source", Channel::from_str)?,
            created_at: row.get(9)?,
        })
    }
}
