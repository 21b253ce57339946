// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Scheduler endpoints.
//!
//! Called by the external cron scheduler with the shared bearer secret.
//! The auth middleware is applied in routes/mod.rs for these routes.

use crate::error::{AppError, Result};
use crate::models::LogEntry;
use crate::services::checkin::{run_daily_check_in, CheckInReport};
use crate::services::jobs::record_logs;
use crate::services::redeem::{run_redeem_codes, RedeemReport};
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/cron/check-in", get(cron_check_in))
        .route("/api/cron/redeem-code", get(cron_redeem_code))
}

/// Owner of log rows written before any user is known.
const UNKNOWN_USER: &str = "Unknown";

/// Run the daily check-in for every user.
async fn cron_check_in(State(state): State<Arc<AppState>>) -> Result<Json<CheckInReport>> {
    match run_daily_check_in(&state).await {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            if let Some(log) = run_failure_log(&e) {
                tracing::error!(error = %e, "Daily check-in run failed");
                record_logs(&state.db, &[log]).await;
            }
            Err(e)
        }
    }
}

/// Log row for a check-in run that failed before reaching any user.
/// Having no settings at all is reported to the caller only.
fn run_failure_log(error: &AppError) -> Option<LogEntry> {
    match error {
        AppError::NotFound(_) => None,
        other => Some(LogEntry::check_in_error(UNKNOWN_USER, other.to_string())),
    }
}

/// Redeem pending codes for every user.
async fn cron_redeem_code(State(state): State<Arc<AppState>>) -> Result<Json<RedeemReport>> {
    let report = run_redeem_codes(&state).await.inspect_err(|e| {
        tracing::error!(error = %e, "Redeem code run failed");
    })?;
    Ok(Json(report))
}
