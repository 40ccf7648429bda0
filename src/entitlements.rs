//! The shared transition function.
//!
//! Every channel that learns a payment outcome (webhook, synchronous
//! confirmation, reconciliation sweep, admin cancel) funnels through
//! `apply_event`. All writes for one event happen in one SQLite transaction,
//! so a crash mid-event leaves no partial state, and every write is
//! conditional, so re-delivery of the same event is a no-op.

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::models::{Channel, PaymentEvent, PaymentEventKind};

/// The welcome sequence marker written on a fresh grant.
const WELCOME_SEQUENCE: &str = "purchased";
const WELCOME_DAY: i64 = 0;

/// What an event actually changed. Re-deliveries come back all-false.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventOutcome {
    /// The one-time purchase flag flipped on this call.
    pub purchase_granted: bool,
    /// The subscription status changed on this call.
    pub subscription_changed: bool,
    /// Some(true): this call redeemed the code. Some(false): a code was
    /// present but already used, expired, or bound elsewhere.
    pub discount_redeemed: Option<bool>,
    /// This call inserted the welcome marker (and spawned the send).
    pub welcome_triggered: bool,
}

/// Apply a normalized payment event to the entitlement store.
///
/// Must be called from within a tokio runtime (the welcome email send is
/// spawned after commit).
pub fn apply_event(state: &AppState, event: &PaymentEvent, source: Channel) -> Result<EventOutcome> {
    let mut conn = state.db.get()?;
    let tx = conn.transaction()?;

    let mut outcome = EventOutcome::default();

    match event.kind {
        PaymentEventKind::PaymentSucceeded => {
            if event.product.grants_purchase() {
                outcome.purchase_granted =
                    queries::try_grant_purchase(&tx, &event.email, event.occurred_at)?;
            }
            if event.product.grants_subscription() {
                outcome.subscription_changed =
                    queries::activate_subscription(&tx, &event.email, event.occurred_at)?;
            }

            if let Some(code) = &event.discount_code {
                let redeemed = queries::try_redeem_discount_code(&tx, code, &event.email)?;
                if !redeemed {
                    // Used, expired, or bound to someone else. The grant
                    // stands either way.
                    tracing::warn!(
                        code = %code,
                        email = %event.email,
                        "Discount code on successful payment could not be redeemed"
                    );
                }
                outcome.discount_redeemed = Some(redeemed);
            }

            if outcome.purchase_granted || outcome.subscription_changed {
                outcome.welcome_triggered =
                    queries::try_mark_email_sent(&tx, &event.email, WELCOME_SEQUENCE, WELCOME_DAY)?;
            }
        }
        PaymentEventKind::PaymentFailed => {
            // Ledger only. Entitlements never regress on a failed charge.
        }
        PaymentEventKind::SubscriptionCanceled => {
            outcome.subscription_changed = queries::cancel_subscription(&tx, &event.email)?;
        }
        PaymentEventKind::Refunded => {
            queries::apply_refund(&tx, &event.email, event.occurred_at)?;
        }
    }

    // Resolve the pending transaction this event settles, in the same
    // transaction. CAS: a lost race here is fine.
    if let Some(token) = &event.transaction_id {
        if event.kind == PaymentEventKind::PaymentSucceeded {
            queries::try_complete_pending_transaction(&tx, token)?;
        }
    }

    queries::record_transaction(&tx, event, source)?;
    tx.commit()?;

    tracing::info!(
        kind = %event.kind.ledger_status(),
        email = %event.email,
        product = %event.product,
        source = %source,
        granted = outcome.purchase_granted,
        "Applied payment event"
    );

    if outcome.welcome_triggered {
        let email_service = state.email.clone();
        let to = event.email.clone();
        let product = event.product;
        tokio::spawn(async move {
            // Failures are logged only. The entitlement is already durable
            // and the marker keeps re-deliveries from retrying the send.
            if let Err(e) = email_service.send_welcome(&to, product).await {
                tracing::error!(error = %e, to = %to, "Welcome email send failed");
            }
        });
    }

    Ok(outcome)
}
