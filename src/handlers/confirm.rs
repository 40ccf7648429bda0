//! Synchronous confirmation, called from the payment-success page.
//!
//! Fallback for the (common) case where the customer lands back on our site
//! before the processor callback arrives. One short retry covers the race;
//! anything slower is the sweep's job.

use std::time::Duration;

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::{Channel, PaymentEvent, PaymentEventKind};
use crate::payments::ProcessorStatus;

const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub success: bool,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
}

pub async fn confirm_payment(
    State(state): State<AppState>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>> {
    let pending = {
        let conn = state.db.get()?;
        queries::get_pending_transaction(&conn, &req.token)?
    }
    .ok_or_else(|| AppError::NotFound(format!("Unknown transaction token: {}", req.token)))?;

    // One immediate attempt, one retry after a short delay. The page may
    // redirect before the processor finishes settling.
    let mut status = state.processor.lookup_status(&req.token).await?;
    if matches!(status, ProcessorStatus::Pending) {
        tokio::time::sleep(RETRY_DELAY).await;
        status = state.processor.lookup_status(&req.token).await?;
    }

    match status {
        ProcessorStatus::Approved(approved) => {
            let mut event = PaymentEvent::new(
                PaymentEventKind::PaymentSucceeded,
                approved.email.as_deref().unwrap_or(&pending.email),
                approved.product.unwrap_or(pending.product),
                Utc::now().timestamp(),
            );
            event.transaction_id = Some(pending.token.clone());
            event.amount_cents = approved.amount_cents.or(Some(pending.amount_cents));
            event.currency = approved.currency;
            event.discount_code = approved.discount_code.or(pending.discount_code);

            crate::entitlements::apply_event(&state, &event, Channel::Confirm)?;

            Ok(Json(ConfirmResponse {
                success: true,
                status: "success",
                email: Some(event.email),
                product: Some(event.product.as_str().to_string()),
            }))
        }
        ProcessorStatus::Pending => Ok(Json(ConfirmResponse {
            success: false,
            status: "pending",
            email: None,
            product: None,
        })),
        ProcessorStatus::Declined => Ok(Json(ConfirmResponse {
            success: false,
            status: "declined",
            email: None,
            product: None,
        })),
        ProcessorStatus::NotFound => Ok(Json(ConfirmResponse {
            success: false,
            status: "not_found",
            email: None,
            product: None,
        })),
    }
}
