use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

use super::from_row::{
    query_all, query_one, DISCOUNT_CODE_COLS, ENTITLEMENT_COLS, PENDING_TRANSACTION_COLS,
    TRANSACTION_RECORD_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Pending-Transaction Tracker ============

/// Record a checkout we just handed to a customer. The token comes from the
/// processor (page request uid), so the caller supplies it.
pub fn create_pending_transaction(
    conn: &Connection,
    token: &str,
    email: &str,
    product: ProductKind,
    amount_cents: i64,
    discount_code: Option<&str>,
) -> Result<PendingTransaction> {
    let created_at = now();
    let email = email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO pending_transactions (token, email, product, amount_cents, discount_code, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
        params![token, &email, product.as_str(), amount_cents, discount_code, created_at],
    )?;

    Ok(PendingTransaction {
        token: token.to_string(),
        email,
        product,
        amount_cents,
        discount_code: discount_code.map(String::from),
        status: PendingStatus::Pending,
        created_at,
        completed_at: None,
    })
}

pub fn get_pending_transaction(
    conn: &Connection,
    token: &str,
) -> Result<Option<PendingTransaction>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM pending_transactions WHERE token = ?1",
            PENDING_TRANSACTION_COLS
        ),
        &[&token],
    )
}

/// Atomically move a pending transaction to `completed`. Returns true if this
/// call won the transition; false means it was already resolved (another
/// channel got there first) or the token is unknown.
pub fn try_complete_pending_transaction(conn: &Connection, token: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE pending_transactions SET status = 'completed', completed_at = ?1
         WHERE token = ?2 AND status = 'pending'",
        params![now(), token],
    )?;
    Ok(affected > 0)
}

/// Mark a pending transaction expired. Same CAS discipline as completion:
/// never transitions a resolved row backward.
pub fn expire_pending_transaction(conn: &Connection, token: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE pending_transactions SET status = 'expired', completed_at = ?1
         WHERE token = ?2 AND status = 'pending'",
        params![now(), token],
    )?;
    Ok(affected > 0)
}

/// Pending transactions at least `min_age_secs` old and younger than the
/// `max_age_secs` ceiling, oldest first. The sweep's work queue.
pub fn list_pending_older_than(
    conn: &Connection,
    min_age_secs: i64,
    max_age_secs: i64,
    limit: i64,
) -> Result<Vec<PendingTransaction>> {
    let now = now();
    query_all(
        conn,
        &format!(
            "SELECT {} FROM pending_transactions
             WHERE status = 'pending' AND created_at <= ?1 AND created_at >= ?2
             ORDER BY created_at ASC LIMIT ?3",
            PENDING_TRANSACTION_COLS
        ),
        &[&(now - min_age_secs), &(now - max_age_secs), &limit],
    )
}

/// Expire every pending transaction past the age ceiling. Returns the number
/// of rows transitioned.
pub fn expire_pending_older_than(conn: &Connection, max_age_secs: i64) -> Result<usize> {
    let now = now();
    let affected = conn.execute(
        "UPDATE pending_transactions SET status = 'expired', completed_at = ?1
         WHERE status = 'pending' AND created_at < ?2",
        params![now, now - max_age_secs],
    )?;
    Ok(affected)
}

// ============ Entitlements ============

pub fn get_entitlement(conn: &Connection, email: &str) -> Result<Option<Entitlement>> {
    let email = email.trim().to_lowercase();
    query_one(
        conn,
        &format!("SELECT {} FROM entitlements WHERE email = ?1", ENTITLEMENT_COLS),
        &[&email],
    )
}

/// Conditionally grant the one-time purchase. Returns true when this event
/// actually flipped the flag; false for re-deliveries (already purchased) and
/// for successes stale relative to a refund.
///
/// The refund guard is strict: an event timestamp at or before `refunded_at`
/// loses to the refund.
pub fn try_grant_purchase(conn: &Connection, email: &str, occurred_at: i64) -> Result<bool> {
    let ts = now();
    let email = email.trim().to_lowercase();
    let affected = conn.execute(
        "INSERT INTO entitlements (email, purchased, purchased_at, subscription_status, created_at, updated_at)
         VALUES (?1, 1, ?2, 'none', ?3, ?3)
         ON CONFLICT(email) DO UPDATE SET
             purchased = 1,
             purchased_at = excluded.purchased_at,
             updated_at = excluded.updated_at
         WHERE entitlements.purchased = 0
           AND (entitlements.refunded_at IS NULL OR entitlements.refunded_at < ?2)",
        params![&email, occurred_at, ts],
    )?;
    Ok(affected > 0)
}

/// Activate (or reactivate) the visualizer subscription. Idempotent; subject
/// to the same refund timestamp guard as the purchase grant.
pub fn activate_subscription(conn: &Connection, email: &str, occurred_at: i64) -> Result<bool> {
    let ts = now();
    let email = email.trim().to_lowercase();
    let affected = conn.execute(
        "INSERT INTO entitlements (email, purchased, subscription_status, created_at, updated_at)
         VALUES (?1, 0, 'active', ?2, ?2)
         ON CONFLICT(email) DO UPDATE SET
             subscription_status = 'active',
             updated_at = excluded.updated_at
         WHERE entitlements.subscription_status != 'active'
           AND (entitlements.refunded_at IS NULL OR entitlements.refunded_at < ?3)",
        params![&email, ts, occurred_at],
    )?;
    Ok(affected > 0)
}

/// Cancel an active subscription. The purchase flag is untouched. No-op when
/// the customer has no active subscription (including no row at all).
pub fn cancel_subscription(conn: &Connection, email: &str) -> Result<bool> {
    let email = email.trim().to_lowercase();
    let affected = conn.execute(
        "UPDATE entitlements SET subscription_status = 'canceled', updated_at = ?1
         WHERE email = ?2 AND subscription_status = 'active'",
        params![now(), &email],
    )?;
    Ok(affected > 0)
}

/// Apply a refund: clear the purchase, drop the subscription, and stamp
/// `refunded_at` so stale successes cannot re-grant. A refund for a customer
/// we have never seen still inserts the stamp (the guard must hold even if
/// the success arrives late).
pub fn apply_refund(conn: &Connection, email: &str, occurred_at: i64) -> Result<()> {
    let ts = now();
    let email = email.trim().to_lowercase();
    conn.execute(
        "INSERT INTO entitlements (email, purchased, subscription_status, refunded_at, created_at, updated_at)
         VALUES (?1, 0, 'none', ?2, ?3, ?3)
         ON CONFLICT(email) DO UPDATE SET
             purchased = 0,
             purchased_at = NULL,
             subscription_status = 'none',
             refunded_at = MAX(COALESCE(entitlements.refunded_at, 0), ?2),
             updated_at = excluded.updated_at",
        params![&email, occurred_at, ts],
    )?;
    Ok(())
}

// ============ Discount Codes ============

const CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a code in the RENO-XXXX-XXXXXX format: four characters derived
/// from the mailbox, six random.
pub fn generate_discount_code(
    conn: &Connection,
    email: &str,
    discount_percent: i64,
    ttl_secs: i64,
) -> Result<DiscountCode> {
    let email = email.trim().to_lowercase();
    let mailbox: String = email
        .split('@')
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_uppercase();
    let mailbox = format!("{:X<4}", mailbox);

    let mut rng = rand::thread_rng();
    let random: String = (0..6)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect();

    let code = format!("RENO-{}-{}", mailbox, random);
    create_discount_code(conn, &code, &email, discount_percent, now() + ttl_secs)
}

pub fn create_discount_code(
    conn: &Connection,
    code: &str,
    email: &str,
    discount_percent: i64,
    expires_at: i64,
) -> Result<DiscountCode> {
    let created_at = now();
    let email = email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO discount_codes (code, email, discount_percent, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![code, &email, discount_percent, expires_at, created_at],
    )?;

    Ok(DiscountCode {
        code: code.to_string(),
        email,
        discount_percent,
        expires_at,
        used_at: None,
        created_at,
    })
}

pub fn get_discount_code(conn: &Connection, code: &str) -> Result<Option<DiscountCode>> {
    query_one(
        conn,
        &format!("SELECT {} FROM discount_codes WHERE code = ?1", DISCOUNT_CODE_COLS),
        &[&code],
    )
}

/// Atomically redeem a code for `email`. At most one caller ever gets true:
/// the conditional UPDATE is the only write path for `used_at`.
pub fn try_redeem_discount_code(conn: &Connection, code: &str, email: &str) -> Result<bool> {
    let ts = now();
    let email = email.trim().to_lowercase();
    let affected = conn.execute(
        "UPDATE discount_codes SET used_at = ?1
         WHERE code = ?2 AND used_at IS NULL AND email = ?3 AND expires_at > ?1",
        params![ts, code, &email],
    )?;
    Ok(affected > 0)
}

/// Delete expired codes that were never redeemed. Returns the number removed.
pub fn cleanup_expired_discount_codes(conn: &Connection) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM discount_codes WHERE used_at IS NULL AND expires_at < ?1",
        params![now()],
    )?;
    Ok(deleted)
}

// ============ Transaction Ledger ============

/// Append an observed processor outcome to the ledger.
pub fn record_transaction(
    conn: &Connection,
    event: &PaymentEvent,
    source: Channel,
) -> Result<TransactionRecord> {
    let id = gen_id();
    let created_at = now();
    let status = event.kind.ledger_status();

    conn.execute(
        "INSERT INTO transactions (id, email, product, amount_cents, currency, status, transaction_id, discount_code, source, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            &id,
            &event.email,
            event.product.as_str(),
            event.amount_cents,
            &event.currency,
            status,
            &event.transaction_id,
            &event.discount_code,
            source.as_str(),
            created_at
        ],
    )?;

    Ok(TransactionRecord {
        id,
        email: event.email.clone(),
        product: event.product,
        amount_cents: event.amount_cents,
        currency: event.currency.clone(),
        status: status.to_string(),
        transaction_id: event.transaction_id.clone(),
        discount_code: event.discount_code.clone(),
        source,
        created_at,
    })
}

pub fn list_transactions_for_email(
    conn: &Connection,
    email: &str,
) -> Result<Vec<TransactionRecord>> {
    let email = email.trim().to_lowercase();
    query_all(
        conn,
        &format!(
            "SELECT {} FROM transactions WHERE email = ?1 ORDER BY created_at ASC",
            TRANSACTION_RECORD_COLS
        ),
        &[&email],
    )
}

// ============ Email Sequence Dedup ============

/// Atomically record that a sequence email is being sent. Returns true if
/// this is the first time; false means it was already sent and the caller
/// must skip the send.
pub fn try_mark_email_sent(
    conn: &Connection,
    email: &str,
    sequence: &str,
    day: i64,
) -> Result<bool> {
    let email = email.trim().to_lowercase();
    let affected = conn.execute(
        "INSERT OR IGNORE INTO email_log (id, email, sequence, day, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![gen_id(), &email, sequence, day, now()],
    )?;
    Ok(affected > 0)
}
