//! PayPlus push-callback ingestion.
//!
//! PayPlus delivers callbacks as JSON or form-urlencoded, with field aliases
//! that vary by page configuration. Everything is normalized into a
//! `PaymentEvent` before touching state. The contract after a successful
//! parse is: always 200. A 4xx/5xx would make PayPlus retry-storm us, and
//! business failures are the sweep's job to recover, not the processor's.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::models::{Channel, PaymentEvent, PaymentEventKind, ProductKind};
use crate::payments::verify_webhook_signature;

const SIGNATURE_HEADER: &str = "x-payplus-signature";

pub async fn handle_payplus_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    match &state.webhook_secret {
        Some(secret) => {
            let signature = headers
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .ok_or(AppError::Unauthorized)?;
            if !verify_webhook_signature(secret, &body, signature) {
                tracing::warn!("Webhook rejected: bad signature");
                return Err(AppError::Unauthorized);
            }
        }
        None => {
            tracing::warn!("No webhook secret configured, accepting unsigned callback");
        }
    }

    let data = parse_body(&headers, &body)?;

    let event = match normalize(&data) {
        Ok(event) => event,
        Err(reason) => {
            // Parsed but unusable (no email, unknown product). Ack anyway;
            // there is nothing a redelivery would fix.
            tracing::warn!(reason = %reason, "Webhook callback not normalizable");
            return Ok(Json(json!({ "received": true, "error": reason })));
        }
    };

    match crate::entitlements::apply_event(&state, &event, Channel::Webhook) {
        Ok(outcome) => Ok(Json(json!({
            "received": true,
            "status": event.kind.ledger_status(),
            "email": event.email,
            "product": event.product.as_str(),
            "granted": outcome.purchase_granted,
        }))),
        Err(e) => {
            tracing::error!(error = %e, email = %event.email, "Webhook event failed to apply");
            Ok(Json(json!({ "received": true, "error": "internal" })))
        }
    }
}

/// Parse the raw body as JSON or form-urlencoded, with a JSON fallback for
/// callbacks that omit the content type.
fn parse_body(headers: &HeaderMap, body: &Bytes) -> Result<Value> {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.contains("application/x-www-form-urlencoded") {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid form body: {}", e)))?;
        let map: Map<String, Value> = pairs
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        return Ok(Value::Object(map));
    }

    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook body: {}", e)))
}

fn get_str<'a>(data: &'a Value, key: &str) -> Option<&'a str> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Status codes arrive as "0", "000", or the number 0 depending on channel.
fn status_code(data: &Value) -> Option<String> {
    match data.get("status_code") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Amounts are ILS decimals, as a number in JSON bodies and a string in
/// form bodies.
fn amount_cents(data: &Value) -> Option<i64> {
    let ils = match data.get("amount") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    Some((ils * 100.0).round() as i64)
}

/// Map a raw callback into a `PaymentEvent`, or a reason it cannot be one.
fn normalize(data: &Value) -> std::result::Result<PaymentEvent, &'static str> {
    let email = get_str(data, "more_info_1")
        .or_else(|| get_str(data, "email"))
        .or_else(|| get_str(data, "customer_email"))
        .ok_or("no email in callback")?;

    let callback_type = get_str(data, "type").unwrap_or("");
    let status = get_str(data, "status").unwrap_or("");

    let kind = if callback_type == "recurring_cancel"
        || get_str(data, "action") == Some("cancel")
        || status == "cancelled"
    {
        PaymentEventKind::SubscriptionCanceled
    } else if callback_type == "refund" || status == "refunded" {
        PaymentEventKind::Refunded
    } else {
        let approved = matches!(status_code(data).as_deref(), Some("0") | Some("000"))
            || status == "approved";
        if approved {
            PaymentEventKind::PaymentSucceeded
        } else {
            PaymentEventKind::PaymentFailed
        }
    };

    let product = get_str(data, "more_info")
        .or_else(|| get_str(data, "product_type"))
        .and_then(ProductKind::from_str);

    // Recurring lifecycle callbacks may omit the product; they can only mean
    // the subscription. Refunds revoke everything regardless of product (it
    // only feeds the ledger), and no other channel can observe a refund, so
    // one without metadata must still go through. Payment outcomes need one.
    let product = match (product, kind) {
        (Some(p), _) => p,
        (None, PaymentEventKind::SubscriptionCanceled) => ProductKind::Visualizer,
        (None, PaymentEventKind::Refunded) => ProductKind::Premium,
        (None, _) => return Err("unknown product in callback"),
    };

    // Arrival time: PayPlus callbacks carry no event timestamp. The refund
    // guard compares these stamps, so it assumes arrival order approximates
    // causal order.
    let mut event = PaymentEvent::new(kind, email, product, Utc::now().timestamp());
    // The page request uid keys the pending transaction; the transaction uid
    // is the fallback processor reference.
    event.transaction_id = get_str(data, "page_request_uid")
        .or_else(|| get_str(data, "transaction_uid"))
        .or_else(|| get_str(data, "recurring_id"))
        .map(String::from);
    event.amount_cents = amount_cents(data);
    event.currency = get_str(data, "currency_code").map(String::from);
    event.discount_code = get_str(data, "more_info_3")
        .or_else(|| get_str(data, "discount_code"))
        .map(String::from);

    Ok(event)
}
