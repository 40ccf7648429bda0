//! On-demand reconciliation trigger for external schedulers.

use axum::{extract::State, http::HeaderMap, Json};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::sweep::{self, SweepStats};
use crate::util::extract_bearer_token;

/// Require the configured cron secret as a Bearer token. Unlike the webhook
/// channel, this fails closed: no secret configured means no access.
pub fn require_cron_auth(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let secret = state.cron_secret.as_deref().ok_or(AppError::Unauthorized)?;
    match extract_bearer_token(headers) {
        Some(token) if token == secret => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

pub async fn trigger_reconcile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SweepStats>> {
    require_cron_auth(&state, &headers)?;

    let stats = sweep::run_reconciliation(&state).await?;
    tracing::info!(
        checked = stats.checked,
        completed = stats.completed,
        expired = stats.expired,
        "On-demand reconciliation finished"
    );
    Ok(Json(stats))
}
