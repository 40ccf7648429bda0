//! Discount code validation.
//!
//! Read-only: redemption only ever happens inside the transition function,
//! when a payment carrying the code succeeds.

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::Result;
use crate::extractors::Json;

#[derive(Debug, Deserialize)]
pub struct ValidateDiscount {
    pub code: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ValidateDiscountResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

pub async fn validate_discount(
    State(state): State<AppState>,
    Json(req): Json<ValidateDiscount>,
) -> Result<Json<ValidateDiscountResponse>> {
    let conn = state.db.get()?;
    let Some(discount) = queries::get_discount_code(&conn, req.code.trim())? else {
        return Ok(Json(invalid("not_found")));
    };

    let now = Utc::now().timestamp();
    let reason = if discount.used_at.is_some() {
        Some("already_used")
    } else if discount.is_expired(now) {
        Some("expired")
    } else if !discount.email.eq_ignore_ascii_case(req.email.trim()) {
        Some("wrong_email")
    } else {
        None
    };

    match reason {
        Some(reason) => Ok(Json(invalid(reason))),
        None => Ok(Json(ValidateDiscountResponse {
            valid: true,
            discount_percent: Some(discount.discount_percent),
            reason: None,
        })),
    }
}

fn invalid(reason: &'static str) -> ValidateDiscountResponse {
    ValidateDiscountResponse {
        valid: false,
        discount_percent: None,
        reason: Some(reason),
    }
}
