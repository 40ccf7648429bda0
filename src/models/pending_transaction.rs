use serde::{Deserialize, Serialize};

use super::ProductKind;

/// Lifecycle state of a tracked checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    Pending,
    Completed,
    Expired,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A checkout link we handed to a customer, tracked until a webhook,
/// synchronous confirmation, or the sweep resolves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// Processor-issued page-request token. Primary key.
    pub token: String,
    pub email: String,
    pub product: ProductKind,
    pub amount_cents: i64,
    pub discount_code: Option<String>,
    pub status: PendingStatus,
    pub created_at: i64,
    /// Set when the row leaves `pending` (completed or expired).
    pub completed_at: Option<i64>,
}
