pub mod admin;
pub mod checkout;
pub mod confirm;
pub mod cron;
pub mod discount;
pub mod webhook;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::db::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/checkout", post(checkout::create_checkout))
        .route("/confirm", post(confirm::confirm_payment))
        .route("/webhooks/payplus", post(webhook::handle_payplus_webhook))
        .route("/discount/validate", post(discount::validate_discount))
        .route("/cron/reconcile", get(cron::trigger_reconcile))
        .route("/admin/subscriptions/cancel", post(admin::cancel_subscription))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
