//! Reconciliation sweep.
//!
//! Webhooks get lost and customers close tabs before the success page loads,
//! so a background task periodically asks the processor for the authoritative
//! status of every unresolved checkout. The sweep is the convergence
//! guarantee: any paid-but-unrecorded transaction inside the lookback window
//! is found within one interval.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::models::{Channel, PaymentEvent, PaymentEventKind, PendingTransaction};
use crate::payments::ProcessorStatus;

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SweepStats {
    /// Pending transactions examined this run.
    pub checked: usize,
    /// Transitioned to completed (payment found approved).
    pub completed: usize,
    /// Transitioned to expired (reported failure past the threshold, or past
    /// the age ceiling).
    pub expired: usize,
    /// Expired unused discount codes purged.
    pub codes_purged: usize,
}

/// One reconciliation pass: poll the processor for a batch of unresolved
/// checkouts, then run the age-ceiling expiries.
pub async fn run_reconciliation(state: &AppState) -> Result<SweepStats> {
    let cfg = &state.sweep;
    let mut stats = SweepStats::default();

    let batch = {
        let conn = state.db.get()?;
        queries::list_pending_older_than(&conn, 0, cfg.max_age_secs, cfg.batch_size)?
    };

    let now = Utc::now().timestamp();

    for pending in batch {
        stats.checked += 1;

        match state.processor.lookup_status(&pending.token).await {
            Ok(ProcessorStatus::Approved(approved)) => {
                // Stamped with observation time, not settlement time (the IPN
                // reports no event date); the refund guard compares these
                // stamps, so arrival order stands in for causal order.
                let mut event = PaymentEvent::new(
                    PaymentEventKind::PaymentSucceeded,
                    approved.email.as_deref().unwrap_or(&pending.email),
                    approved.product.unwrap_or(pending.product),
                    now,
                );
                event.transaction_id = Some(pending.token.clone());
                event.amount_cents = approved.amount_cents.or(Some(pending.amount_cents));
                event.currency = approved.currency.clone();
                event.discount_code = approved
                    .discount_code
                    .clone()
                    .or_else(|| pending.discount_code.clone());

                match crate::entitlements::apply_event(state, &event, Channel::Sweep) {
                    Ok(_) => {
                        stats.completed += 1;
                        tracing::info!(
                            token = %pending.token,
                            email = %event.email,
                            "Sweep recovered an approved payment"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            token = %pending.token,
                            error = %e,
                            "Sweep failed to apply recovered payment, will retry next run"
                        );
                    }
                }
            }
            Ok(ProcessorStatus::Declined) | Ok(ProcessorStatus::NotFound) => {
                // Only expire once the customer has had a real chance to
                // retry the page. Younger failures stay pending.
                if pending_age(&pending, now) > cfg.failure_age_secs {
                    let conn = state.db.get()?;
                    if queries::expire_pending_transaction(&conn, &pending.token)? {
                        stats.expired += 1;
                        tracing::info!(token = %pending.token, "Expired failed pending transaction");
                    }
                }
            }
            Ok(ProcessorStatus::Pending) => {
                // Customer may still be on the payment page.
            }
            Err(e) => {
                // Transient processor errors are never definitive. Leave the
                // row for the next run.
                tracing::warn!(token = %pending.token, error = %e, "Processor lookup failed");
            }
        }
    }

    {
        let conn = state.db.get()?;
        stats.expired += queries::expire_pending_older_than(&conn, cfg.max_age_secs)?;
        stats.codes_purged = queries::cleanup_expired_discount_codes(&conn)?;
    }

    Ok(stats)
}

fn pending_age(pending: &PendingTransaction, now: i64) -> i64 {
    now - pending.created_at
}

/// Spawn the periodic reconciliation task. Runs until the process exits.
pub fn spawn_sweep_task(state: AppState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(state.sweep.interval_secs));
        // The first tick fires immediately; skip it so startup isn't racing
        // checkouts created moments before a restart.
        interval.tick().await;

        loop {
            interval.tick().await;
            match run_reconciliation(&state).await {
                Ok(stats) => {
                    if stats.checked > 0 || stats.expired > 0 || stats.codes_purged > 0 {
                        tracing::info!(
                            checked = stats.checked,
                            completed = stats.completed,
                            expired = stats.expired,
                            codes_purged = stats.codes_purged,
                            "Reconciliation sweep finished"
                        );
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Reconciliation sweep failed");
                }
            }
        }
    })
}
