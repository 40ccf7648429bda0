// Shared test fixtures and helpers

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

// Re-export the main library crate
pub use renobudget_billing::config::SweepConfig;
pub use renobudget_billing::db::{init_db, queries, AppState};
pub use renobudget_billing::email::EmailService;
pub use renobudget_billing::entitlements;
pub use renobudget_billing::handlers;
pub use renobudget_billing::models::*;
pub use renobudget_billing::payments::{
    ApprovedPayment, CheckoutPage, CheckoutRequest, ProcessorGateway, ProcessorStatus,
};
pub use renobudget_billing::sweep;

use renobudget_billing::error::Result;

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Get current Unix timestamp
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Get a past timestamp (seconds ago)
pub fn past_timestamp(secs: i64) -> i64 {
    now() - secs
}

/// A scriptable processor stand-in. Tests register the status each token
/// should report; unknown tokens report `NotFound`, matching how PayPlus
/// answers for a uid it never issued.
pub struct StubProcessor {
    statuses: Mutex<HashMap<String, ProcessorStatus>>,
    canceled: Mutex<Vec<String>>,
}

impl StubProcessor {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            canceled: Mutex::new(Vec::new()),
        }
    }

    pub fn set_status(&self, token: &str, status: ProcessorStatus) {
        self.statuses.lock().unwrap().insert(token.to_string(), status);
    }

    /// Emails passed to `cancel_recurring`, in call order.
    pub fn canceled_emails(&self) -> Vec<String> {
        self.canceled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessorGateway for StubProcessor {
    async fn create_checkout(&self, _request: &CheckoutRequest) -> Result<CheckoutPage> {
        let token = format!("pp-{}", uuid::Uuid::new_v4());
        Ok(CheckoutPage {
            payment_url: format!("https://pay.example.test/{}", token),
            token,
        })
    }

    async fn lookup_status(&self, token: &str) -> Result<ProcessorStatus> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .unwrap_or(ProcessorStatus::NotFound))
    }

    async fn cancel_recurring(&self, email: &str) -> Result<()> {
        self.canceled.lock().unwrap().push(email.to_string());
        Ok(())
    }
}

/// An approved-payment status with every processor-reported field filled in.
pub fn approved(email: &str, product: ProductKind, amount_cents: i64) -> ProcessorStatus {
    ProcessorStatus::Approved(ApprovedPayment {
        email: Some(email.to_string()),
        product: Some(product),
        amount_cents: Some(amount_cents),
        currency: Some("ILS".to_string()),
        transaction_id: Some(format!("tx-{}", uuid::Uuid::new_v4())),
        discount_code: None,
    })
}

/// An approved-payment status where the processor reported nothing beyond
/// approval, forcing fallbacks to the pending row.
pub fn approved_bare() -> ProcessorStatus {
    ProcessorStatus::Approved(ApprovedPayment {
        email: None,
        product: None,
        amount_cents: None,
        currency: None,
        transaction_id: None,
        discount_code: None,
    })
}

/// Create an AppState for testing with an in-memory database and a stub
/// processor. No webhook secret (unsigned callbacks accepted) and a fixed
/// cron secret; tests override the fields they care about.
pub fn create_test_app_state(processor: Arc<StubProcessor>) -> AppState {
    let manager = SqliteConnectionManager::memory();
    // Single connection so every caller sees the same in-memory database.
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    AppState {
        db: pool,
        base_url: "http://localhost:3000".to_string(),
        webhook_secret: None,
        cron_secret: Some("test-cron-secret".to_string()),
        processor,
        email: Arc::new(EmailService::new(None, "billing@renobudget.test".to_string())),
        sweep: SweepConfig::default(),
    }
}

/// Create the full application router over the given state.
pub fn test_app(state: AppState) -> Router {
    handlers::router().with_state(state)
}

/// Create a pending transaction for a checkout the stub "issued".
pub fn create_test_pending(
    conn: &Connection,
    token: &str,
    email: &str,
    product: ProductKind,
) -> PendingTransaction {
    queries::create_pending_transaction(conn, token, email, product, product.price_cents(), None)
        .expect("Failed to create test pending transaction")
}

/// Rewind a pending transaction's creation time by `secs`.
pub fn backdate_pending(conn: &Connection, token: &str, secs: i64) {
    conn.execute(
        "UPDATE pending_transactions SET created_at = created_at - ?1 WHERE token = ?2",
        rusqlite::params![secs, token],
    )
    .expect("Failed to backdate pending transaction");
}

/// Create a discount code valid for one hour, bound to `email`.
pub fn create_test_discount(
    conn: &Connection,
    code: &str,
    email: &str,
    discount_percent: i64,
) -> DiscountCode {
    queries::create_discount_code(conn, code, email, discount_percent, now() + 3600)
        .expect("Failed to create test discount code")
}

/// A successful-payment event tied to a pending-transaction token.
pub fn success_event(email: &str, product: ProductKind, token: &str) -> PaymentEvent {
    let mut event = PaymentEvent::new(PaymentEventKind::PaymentSucceeded, email, product, now());
    event.transaction_id = Some(token.to_string());
    event.amount_cents = Some(product.price_cents());
    event.currency = Some("ILS".to_string());
    event
}
