use serde::{Deserialize, Serialize};

use super::ProductKind;

/// The four facts any channel (webhook, sync confirmation, sweep, admin) can
/// learn about a payment. Everything upstream normalizes into this before
/// touching the entitlement store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    PaymentSucceeded,
    PaymentFailed,
    SubscriptionCanceled,
    Refunded,
}

impl PaymentEventKind {
    /// Ledger status string for this event kind.
    pub fn ledger_status(&self) -> &'static str {
        match self {
            Self::PaymentSucceeded => "completed",
            Self::PaymentFailed => "failed",
            Self::SubscriptionCanceled => "cancelled",
            Self::Refunded => "refunded",
        }
    }
}

/// Which channel observed the processor outcome. Recorded in the ledger so
/// convergence paths can be told apart after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Webhook,
    Confirm,
    Sweep,
    Admin,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Confirm => "confirm",
            Self::Sweep => "sweep",
            Self::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "webhook" => Some(Self::Webhook),
            "confirm" => Some(Self::Confirm),
            "sweep" => Some(Self::Sweep),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized payment event, ready for the transition function.
///
/// `email` is lowercased at construction; the entitlement store keys on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub kind: PaymentEventKind,
    pub email: String,
    pub product: ProductKind,
    /// Processor transaction/page-request identifier. Ties the event back to
    /// a pending transaction when the flow started on our checkout.
    pub transaction_id: Option<String>,
    /// Amount in agorot as reported by the processor.
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub discount_code: Option<String>,
    /// Unix seconds the event occurred at the processor.
    pub occurred_at: i64,
}

impl PaymentEvent {
    pub fn new(kind: PaymentEventKind, email: &str, product: ProductKind, occurred_at: i64) -> Self {
        Self {
            kind,
            email: email.trim().to_lowercase(),
            product,
            transaction_id: None,
            amount_cents: None,
            currency: None,
            discount_code: None,
            occurred_at,
        }
    }
}
