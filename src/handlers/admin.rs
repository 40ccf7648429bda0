//! Admin subscription cancellation.
//!
//! Asks the processor to stop the recurring charge first; only a confirmed
//! processor-side cancel is applied locally. A local-only cancel would keep
//! charging the customer.

use axum::{extract::State, http::HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{Channel, PaymentEvent, PaymentEventKind, ProductKind};

use super::cron::require_cron_auth;

#[derive(Debug, Deserialize)]
pub struct CancelSubscription {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CancelSubscriptionResponse {
    pub success: bool,
    /// False when the customer had no active subscription to cancel.
    pub subscription_changed: bool,
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CancelSubscription>,
) -> Result<Json<CancelSubscriptionResponse>> {
    require_cron_auth(&state, &headers)?;

    let email = req.email.trim().to_lowercase();
    state.processor.cancel_recurring(&email).await?;

    let event = PaymentEvent::new(
        PaymentEventKind::SubscriptionCanceled,
        &email,
        ProductKind::Visualizer,
        Utc::now().timestamp(),
    );
    let outcome = crate::entitlements::apply_event(&state, &event, Channel::Admin)?;

    tracing::info!(
        email = %email,
        subscription_changed = outcome.subscription_changed,
        "Admin canceled subscription"
    );

    Ok(Json(CancelSubscriptionResponse {
        success: true,
        subscription_changed: outcome.subscription_changed,
    }))
}
