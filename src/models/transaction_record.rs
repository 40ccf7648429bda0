use serde::{Deserialize, Serialize};

use super::{Channel, ProductKind};

/// Append-only ledger row. One row per observed processor outcome; the
/// entitlement row holds current state, this holds history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub email: String,
    pub product: ProductKind,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    /// "completed" | "failed" | "cancelled" | "refunded"
    pub status: String,
    /// Processor transaction identifier, when the event carried one.
    pub transaction_id: Option<String>,
    pub discount_code: Option<String>,
    /// Which channel observed the outcome.
    pub source: Channel,
    pub created_at: i64,
}
