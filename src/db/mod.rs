mod schema;
pub mod queries;

mod from_row;
pub use from_row::{
    query_all, query_one, FromRow, DISCOUNT_CODE_COLS, ENTITLEMENT_COLS, PENDING_TRANSACTION_COLS,
    TRANSACTION_RECORD_COLS,
};
pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::SweepConfig;
use crate::email::EmailService;
use crate::payments::ProcessorGateway;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers and the background sweep.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Base URL for processor callbacks (e.g., https://billing.example.com)
    pub base_url: String,
    /// Shared secret for webhook signature verification. None = accept unsigned.
    pub webhook_secret: Option<String>,
    /// Bearer secret guarding the cron and admin endpoints.
    pub cron_secret: Option<String>,
    pub processor: Arc<dyn ProcessorGateway>,
    pub email: Arc<EmailService>,
    pub sweep: SweepConfig,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
