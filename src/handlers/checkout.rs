//! Checkout-link creation.

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{queries, AppState};
use crate::error::{AppError, Result};
use crate::extractors::Json;
use crate::models::ProductKind;
use crate::payments::CheckoutRequest;

#[derive(Debug, Deserialize)]
pub struct CreateCheckout {
    pub email: String,
    pub product: ProductKind,
    #[serde(default)]
    pub discount_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub payment_url: String,
    pub token: String,
    pub amount_cents: i64,
}

pub async fn create_checkout(
    State(state): State<AppState>,
    Json(req): Json<CreateCheckout>,
) -> Result<Json<CheckoutResponse>> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".into()));
    }

    let mut amount_cents = req.product.price_cents();

    // Validate (but do not consume) the discount code. Redemption happens
    // atomically when the payment actually succeeds.
    if let Some(code) = &req.discount_code {
        let conn = state.db.get()?;
        let discount = queries::get_discount_code(&conn, code)?
            .ok_or_else(|| AppError::BadRequest("Unknown discount code".into()))?;
        if !discount.usable_by(&email, Utc::now().timestamp()) {
            return Err(AppError::BadRequest("Discount code is not usable".into()));
        }
        amount_cents = discount.apply(amount_cents);
    }

    let page = state
        .processor
        .create_checkout(&CheckoutRequest {
            email: email.clone(),
            product: req.product,
            amount_cents,
            discount_code: req.discount_code.clone(),
        })
        .await?;

    // Persist before handing out the URL: once the customer can pay, the
    // sweep must be able to find the transaction.
    {
        let conn = state.db.get()?;
        queries::create_pending_transaction(
            &conn,
            &page.token,
            &email,
            req.product,
            amount_cents,
            req.discount_code.as_deref(),
        )?;
    }

    tracing::info!(
        email = %email,
        product = %req.product,
        amount_cents,
        token = %page.token,
        "Created checkout link"
    );

    Ok(Json(CheckoutResponse {
        payment_url: page.payment_url,
        token: page.token,
        amount_cents,
    }))
}
