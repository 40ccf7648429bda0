use serde::{Deserialize, Serialize};

/// What the customer bought. Determines which entitlement columns a
/// successful payment touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    /// One-time purchase, lifetime premium access.
    Premium,
    /// Monthly recurring visualizer subscription.
    Visualizer,
    /// One-time purchase covering premium plus visualizer access.
    Bundle,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Premium => "premium",
            Self::Visualizer => "visualizer",
            Self::Bundle => "bundle",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "premium" => Some(Self::Premium),
            "visualizer" => Some(Self::Visualizer),
            "bundle" => Some(Self::Bundle),
            _ => None,
        }
    }

    /// Whether a successful payment for this product grants the one-time
    /// lifetime purchase.
    pub fn grants_purchase(&self) -> bool {
        matches!(self, Self::Premium | Self::Bundle)
    }

    /// Whether a successful payment for this product activates the
    /// visualizer subscription.
    pub fn grants_subscription(&self) -> bool {
        matches!(self, Self::Visualizer | Self::Bundle)
    }

    /// Whether payments for this product recur monthly.
    pub fn is_recurring(&self) -> bool {
        matches!(self, Self::Visualizer)
    }

    /// List price in agorot (ILS cents).
    pub fn price_cents(&self) -> i64 {
        match self {
            Self::Premium => 14_900,
            Self::Visualizer => 3_999,
            Self::Bundle => 16_900,
        }
    }
}

impl std::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
