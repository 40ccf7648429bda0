//! Outbound email via the Resend API.
//!
//! One template: the purchase welcome email. Send failures are the caller's
//! problem to log, never to roll back; the dedup marker in `email_log` is what
//! guarantees at-most-once, not this module.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::ProductKind;

/// Retry delays in seconds (exponential backoff: 1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Result of attempting to send an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    Sent,
    /// No API key configured; delivery is disabled (dev/test default).
    Disabled,
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
    html: String,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

#[derive(Clone)]
pub struct EmailService {
    api_key: Option<String>,
    from_email: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(api_key: Option<String>, from_email: String) -> Self {
        Self {
            api_key,
            from_email,
            http_client: Client::new(),
        }
    }

    /// Whether sends will actually go out.
    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send the purchase welcome email.
    pub async fn send_welcome(&self, to_email: &str, product: ProductKind) -> Result<EmailSendResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!(to = %to_email, "No Resend API key configured, skipping welcome email");
            return Ok(EmailSendResult::Disabled);
        };

        let product_name = match product {
            ProductKind::Premium => "RenoBudget Premium",
            ProductKind::Visualizer => "RenoBudget Visualizer",
            ProductKind::Bundle => "RenoBudget Premium + Visualizer",
        };

        let subject = format!("Welcome to {}!", product_name);
        let text = format!(
            "Welcome to {}!\n\nYour payment went through and your account is ready. \
             Sign in with this email address ({}) and everything you paid for is unlocked.\n\n\
             Questions? Just reply to this email.\n\n- The RenoBudget team",
            product_name, to_email
        );
        let html = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">Welcome to {}!</h2>
<p>Your payment went through and your account is ready.</p>
<p>Sign in with this email address (<strong>{}</strong>) and everything you paid for is unlocked.</p>
<hr style="border: none; border-top: 1px solid #eee; margin: 30px 0;">
<p style="color: #999; font-size: 12px;">Questions? Just reply to this email.</p>
</body>
</html>"#,
            product_name, to_email
        );

        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![to_email],
            subject,
            text,
            html,
        };

        self.send_request_with_retry(api_key, &request, to_email).await
    }

    /// Send a request to Resend API with exponential backoff retry.
    ///
    /// Retries on transient errors (network issues, 5xx, 429 rate limit).
    /// Fails immediately on non-transient errors (4xx except 429).
    async fn send_request_with_retry(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
        to_email: &str,
    ) -> Result<EmailSendResult> {
        let mut last_error: Option<AppError> = None;

        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            if *delay_secs > 0 {
                tracing::warn!(
                    attempt,
                    delay_secs,
                    "Retrying email send after transient failure"
                );
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.send_resend_request(api_key, request).await {
                Ok(()) => {
                    if attempt > 0 {
                        tracing::info!(attempt, to = %to_email, "Email sent after retry");
                    } else {
                        tracing::info!(to = %to_email, "Welcome email sent via Resend");
                    }
                    return Ok(EmailSendResult::Sent);
                }
                Err((error, is_transient)) => {
                    if is_transient {
                        last_error = Some(error);
                    } else {
                        return Err(error);
                    }
                }
            }
        }

        tracing::error!(
            to = %to_email,
            attempts = RETRY_DELAYS.len() + 1,
            "Email send failed after all retries"
        );
        Err(last_error.unwrap_or_else(|| {
            AppError::Internal("Email service error: all retries exhausted".into())
        }))
    }

    /// Send a single request to Resend API.
    ///
    /// Returns Ok(()) on success, or Err((AppError, is_transient)) on failure.
    async fn send_resend_request(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
    ) -> std::result::Result<(), (AppError, bool)> {
        let response = self
            .http_client
            .post(RESEND_API_URL)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to send request to Resend API");
                // Network errors are transient
                (AppError::Internal(format!("Email service error: {}", e)), true)
            })?;

        let status = response.status();

        if status.is_success() {
            let _result: ResendEmailResponse = response.json().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to parse Resend API response");
                (AppError::Internal("Email service response error".into()), false)
            })?;
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            let is_transient = status.as_u16() == 429 || status.is_server_error();

            if is_transient {
                tracing::warn!(status = %status, body = %body, "Resend API returned transient error");
            } else {
                tracing::error!(status = %status, body = %body, "Resend API returned non-transient error");
            }

            Err((
                AppError::Internal(format!("Email service error: {} - {}", status, body)),
                is_transient,
            ))
        }
    }
}
