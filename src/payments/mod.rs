//! Payment processor integration.
//!
//! `ProcessorGateway` is the seam between the billing core and the processor's
//! HTTP API: handlers and the sweep only see the trait, so tests can inject a
//! stub and the PayPlus client stays confined to `payplus.rs`.

mod payplus;

pub use payplus::PayPlusClient;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::Result;
use crate::models::ProductKind;

type HmacSha256 = Hmac<Sha256>;

/// What we send the processor to open a hosted payment page.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub email: String,
    pub product: ProductKind,
    /// Final amount after discount, in agorot.
    pub amount_cents: i64,
    pub discount_code: Option<String>,
}

/// A hosted payment page the customer can be redirected to.
#[derive(Debug, Clone)]
pub struct CheckoutPage {
    pub payment_url: String,
    /// Processor-issued page-request token. Keys the pending transaction.
    pub token: String,
}

/// Transaction details reported by the processor for an approved payment.
#[derive(Debug, Clone)]
pub struct ApprovedPayment {
    pub email: Option<String>,
    pub product: Option<ProductKind>,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub transaction_id: Option<String>,
    pub discount_code: Option<String>,
}

/// Authoritative status of a checkout, per the processor's IPN endpoint.
#[derive(Debug, Clone)]
pub enum ProcessorStatus {
    Approved(ApprovedPayment),
    Declined,
    /// The customer has not completed (or abandoned) the page yet.
    Pending,
    /// The processor does not know the token.
    NotFound,
}

/// The processor operations the billing core needs. Implemented by
/// `PayPlusClient` in production and by stubs in tests.
#[async_trait]
pub trait ProcessorGateway: Send + Sync {
    /// Create a hosted payment page for the given checkout.
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutPage>;

    /// Look up the authoritative status of a checkout token.
    async fn lookup_status(&self, token: &str) -> Result<ProcessorStatus>;

    /// Ask the processor to stop charging a recurring subscription.
    async fn cancel_recurring(&self, email: &str) -> Result<()>;
}

/// Verify a webhook signature: hex HMAC-SHA256 of the raw body under the
/// shared secret, compared constant-time.
pub fn verify_webhook_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    let expected_bytes = expected.as_bytes();
    let provided_bytes = signature.trim().as_bytes();

    // Length check is not constant-time, but signature length is not secret
    // (always 64 hex chars for SHA-256).
    if expected_bytes.len() != provided_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(provided_bytes).into()
}
