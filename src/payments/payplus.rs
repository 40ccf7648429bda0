//! PayPlus REST client: hosted payment pages, IPN status lookup, and
//! recurring-charge cancellation.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::models::ProductKind;

use super::{ApprovedPayment, CheckoutPage, CheckoutRequest, ProcessorGateway, ProcessorStatus};

/// One-time charge.
const CHARGE_METHOD_SINGLE: u8 = 1;
/// Recurring monthly charge.
const CHARGE_METHOD_RECURRING: u8 = 3;

#[derive(Debug, Clone)]
pub struct PayPlusClient {
    client: Client,
    api_key: String,
    secret_key: String,
    page_uid: String,
    base_url: String,
    /// Our own base URL, for callback/redirect targets.
    callback_base_url: String,
}

#[derive(Debug, Deserialize)]
struct GenerateLinkData {
    payment_page_link: String,
    page_request_uid: String,
}

#[derive(Debug, Deserialize)]
struct GenerateLinkResponse {
    data: Option<GenerateLinkData>,
    #[serde(default)]
    results: Option<Value>,
}

impl PayPlusClient {
    pub fn new(
        api_key: String,
        secret_key: String,
        page_uid: String,
        base_url: String,
        callback_base_url: String,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key,
            secret_key,
            page_uid,
            base_url,
            callback_base_url,
        }
    }

    fn authed(&self, url: String) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("api-key", &self.api_key)
            .header("secret-key", &self.secret_key)
    }
}

#[async_trait]
impl ProcessorGateway for PayPlusClient {
    async fn create_checkout(&self, request: &CheckoutRequest) -> Result<CheckoutPage> {
        let charge_method = if request.product.is_recurring() {
            CHARGE_METHOD_RECURRING
        } else {
            CHARGE_METHOD_SINGLE
        };

        // PayPlus takes amounts in ILS, not agorot.
        let amount = request.amount_cents as f64 / 100.0;

        let body = json!({
            "payment_page_uid": self.page_uid,
            "charge_method": charge_method,
            "amount": amount,
            "currency_code": "ILS",
            "sendEmailApproval": true,
            "sendEmailFailure": false,
            "customer": {
                "customer_name": request.email.split('@').next().unwrap_or(&request.email),
                "email": request.email,
            },
            "refURL_callback": format!("{}/webhooks/payplus", self.callback_base_url),
            "refURL_success": format!(
                "{}/payment-success?product={}&email={}",
                self.callback_base_url,
                request.product,
                urlencoding::encode(&request.email)
            ),
            "refURL_failure": format!("{}/payment-failed", self.callback_base_url),
            // Opaque metadata echoed back in callbacks and IPN lookups.
            "more_info": request.product.as_str(),
            "more_info_1": request.email,
            "more_info_3": request.discount_code.as_deref().unwrap_or(""),
            "initial_invoice": true,
            "language_code": "he",
        });

        let response = self
            .authed(format!("{}/PaymentPages/generateLink", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Processor(format!("generateLink request failed: {}", e)))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Processor(format!("generateLink rejected: {}", text)));
        }

        let parsed: GenerateLinkResponse = response
            .json()
            .await
            .map_err(|e| AppError::Processor(format!("generateLink parse failed: {}", e)))?;

        if let Some(results) = &parsed.results {
            if results.get("status").and_then(Value::as_str) == Some("error") {
                return Err(AppError::Processor(format!("generateLink error: {}", results)));
            }
        }

        let data = parsed
            .data
            .ok_or_else(|| AppError::Processor("generateLink response missing data".into()))?;

        Ok(CheckoutPage {
            payment_url: data.payment_page_link,
            token: data.page_request_uid,
        })
    }

    async fn lookup_status(&self, token: &str) -> Result<ProcessorStatus> {
        let response = self
            .authed(format!("{}/PaymentPages/ipn", self.base_url))
            .json(&json!({ "payment_request_uid": token }))
            .send()
            .await
            .map_err(|e| AppError::Processor(format!("ipn request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(ProcessorStatus::NotFound);
        }
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Processor(format!("ipn rejected: {}", text)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Processor(format!("ipn parse failed: {}", e)))?;

        Ok(parse_ipn_status(&body))
    }

    async fn cancel_recurring(&self, email: &str) -> Result<()> {
        let response = self
            .authed(format!("{}/RecurringPayments/Cancel", self.base_url))
            .json(&json!({ "customer_email": email }))
            .send()
            .await
            .map_err(|e| AppError::Processor(format!("cancel request failed: {}", e)))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Processor(format!("cancel rejected: {}", text)));
        }
        Ok(())
    }
}

/// Interpret an IPN response body. PayPlus nests the transaction one of
/// several ways depending on page state, so this digs tolerantly.
fn parse_ipn_status(body: &Value) -> ProcessorStatus {
    let result = body
        .get("data")
        .and_then(|d| d.get("result"))
        .or_else(|| body.get("result"))
        .unwrap_or(body);

    let tx = result.get("transaction").unwrap_or(result);

    let status_code = result
        .get("status_code")
        .or_else(|| tx.get("status_code"))
        .and_then(value_as_code);

    match status_code.as_deref() {
        // "000" (and the older "0") mean an approved charge.
        Some("000") | Some("0") => {}
        Some(_) => return ProcessorStatus::Declined,
        None => return ProcessorStatus::Pending,
    }

    let email = tx
        .get("more_info_1")
        .or_else(|| tx.get("customer_email"))
        .or_else(|| tx.get("email"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_lowercase());
    let product = tx
        .get("more_info")
        .or_else(|| tx.get("product_type"))
        .and_then(Value::as_str)
        .and_then(ProductKind::from_str);
    let amount_cents = tx
        .get("amount")
        .and_then(Value::as_f64)
        .map(|ils| (ils * 100.0).round() as i64);
    let currency = tx
        .get("currency_code")
        .and_then(Value::as_str)
        .map(String::from);
    let transaction_id = tx
        .get("transaction_uid")
        .or_else(|| tx.get("payment_request_uid"))
        .and_then(Value::as_str)
        .map(String::from);
    let discount_code = tx
        .get("more_info_3")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(String::from);

    ProcessorStatus::Approved(ApprovedPayment {
        email,
        product,
        amount_cents,
        currency,
        transaction_id,
        discount_code,
    })
}

/// Status codes arrive as strings or numbers depending on the endpoint.
fn value_as_code(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
