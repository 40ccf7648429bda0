use serde::{Deserialize, Serialize};

/// A single-use discount code bound to one customer email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCode {
    /// Format: RENO-XXXX-XXXXXX.
    pub code: String,
    /// Only this email may redeem the code.
    pub email: String,
    /// Discount in percent (0-100).
    pub discount_percent: i64,
    pub expires_at: i64,
    /// Set exactly once, by the winning redemption.
    pub used_at: Option<i64>,
    pub created_at: i64,
}

impl DiscountCode {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Whether `email` may redeem this code right now.
    pub fn usable_by(&self, email: &str, now: i64) -> bool {
        self.used_at.is_none() && !self.is_expired(now) && self.email.eq_ignore_ascii_case(email)
    }

    /// Apply the discount to a price in agorot, rounding down.
    pub fn apply(&self, amount_cents: i64) -> i64 {
        amount_cents - (amount_cents * self.discount_percent / 100)
    }
}
