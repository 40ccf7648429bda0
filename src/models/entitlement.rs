use serde::{Deserialize, Serialize};

/// Visualizer subscription state. The one-time purchase is a plain boolean
/// because it never expires; the subscription recurs and can lapse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    None,
    Active,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Active => "active",
            Self::Canceled => "canceled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "active" => Some(Self::Active),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a customer is entitled to, keyed by lowercase email.
///
/// One row per customer. Payment events mutate this row through
/// `entitlements::apply_event` only, never directly from handlers.
///
/// Invariant: `purchased_at` is set iff `purchased` is true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entitlement {
    pub email: String,
    pub purchased: bool,
    /// When the one-time purchase was granted (unix seconds).
    pub purchased_at: Option<i64>,
    pub subscription_status: SubscriptionStatus,
    /// Set when a refund lands. A success event whose processor timestamp is
    /// at or before this must not re-grant.
    pub refunded_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Entitlement {
    pub fn subscription_active(&self) -> bool {
        self.subscription_status == SubscriptionStatus::Active
    }
}
