use rusqlite::Connection;

/// Initialize the billing database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Entitlements (one row per customer, keyed by lowercase email)
        -- Invariant: purchased_at set iff purchased = 1
        CREATE TABLE IF NOT EXISTS entitlements (
            email TEXT PRIMARY KEY,
            purchased INTEGER NOT NULL DEFAULT 0,
            purchased_at INTEGER,
            subscription_status TEXT NOT NULL DEFAULT 'none'
                CHECK (subscription_status IN ('none', 'active', 'canceled')),
            refunded_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Pending transactions (checkout links awaiting resolution)
        CREATE TABLE IF NOT EXISTS pending_transactions (
            token TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            product TEXT NOT NULL CHECK (product IN ('premium', 'visualizer', 'bundle')),
            amount_cents INTEGER NOT NULL,
            discount_code TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'completed', 'expired')),
            created_at INTEGER NOT NULL,
            completed_at INTEGER
        );
        CREATE INDEX IF NOT EXISTS idx_pending_status_created
            ON pending_transactions(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_pending_email ON pending_transactions(email);

        -- Discount codes (single-use, bound to one email)
        CREATE TABLE IF NOT EXISTS discount_codes (
            code TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            discount_percent INTEGER NOT NULL
                CHECK (discount_percent > 0 AND discount_percent <= 100),
            expires_at INTEGER NOT NULL,
            used_at INTEGER,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_discount_expires ON discount_codes(expires_at);

        -- Transactions (append-only ledger of observed processor outcomes)
        CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            product TEXT NOT NULL,
            amount_cents INTEGER,
            currency TEXT,
            status TEXT NOT NULL
                CHECK (status IN ('completed', 'failed', 'cancelled', 'refunded')),
            transaction_id TEXT,
            discount_code TEXT,
            source TEXT NOT NULL CHECK (source IN ('webhook', 'confirm', 'sweep', 'admin')),
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_transactions_email ON transactions(email, created_at);
        CREATE INDEX IF NOT EXISTS idx_transactions_txid ON transactions(transaction_id);

        -- Email log (dedup marker: one sequence mail per email/sequence/day)
        CREATE TABLE IF NOT EXISTS email_log (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            sequence TEXT NOT NULL,
            day INTEGER NOT NULL,
            sent_at INTEGER NOT NULL,
            UNIQUE(email, sequence, day)
        );
        "#,
    )?;
    Ok(())
}
