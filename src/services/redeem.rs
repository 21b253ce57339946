// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Redeem code job.
//!
//! Each run, per user:
//! 1. Create a pending record for every code added within the window
//! 2. Pick the oldest pending codes (a few per run, HoYoverse throttles)
//! 3. Exchange them one at a time, pausing between exchanges
//!
//! A code HoYoverse answered for is marked REDEEMED or FAILED and logged.
//! A code whose request never got an answer stays pending for the next run.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{
    HoyolabCredentials, LogEntry, LogStatus, RedeemStatus, RedeemedCode, UserSettings,
};
use crate::services::hoyolab::{HoyolabClient, RedeemRequest};
use crate::services::jobs::{record_logs, JobKind};
use crate::services::kms::decrypt_credentials;
use crate::time_utils::{format_utc_rfc3339, window_start};
use crate::AppState;
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;

const ALREADY_RUNNING: &str = "Code redemption already running";

/// Totals of a redeem run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RedeemReport {
    /// Users whose codes were processed
    pub users: usize,
    /// Exchange requests sent
    pub attempted: usize,
    pub redeemed: usize,
    pub failed: usize,
}

impl RedeemReport {
    fn add(&mut self, other: &RedeemReport) {
        self.users += other.users;
        self.attempted += other.attempted;
        self.redeemed += other.redeemed;
        self.failed += other.failed;
    }
}

/// Result of one exchange.
#[derive(Debug)]
pub enum RedeemAttempt {
    /// HoYoverse answered; `record` carries the new status.
    Answered { record: RedeemedCode, log: LogEntry },
    /// No usable answer; the code stays pending.
    Unanswered { error: AppError },
}

/// Give `user_id` a pending record for every code added since `window_start`.
///
/// Existing records keep their status. Returns how many were created.
pub async fn sync_active_codes(
    db: &FirestoreDb,
    user_id: &str,
    window_start: &str,
    now: &str,
) -> Result<usize, AppError> {
    let active = db.list_redeem_codes_since(window_start).await?;
    let created = db.ensure_redeemed_codes(user_id, &active, now).await?;
    tracing::debug!(user_id, active = active.len(), created, "Synced active codes");
    Ok(created)
}

pub(crate) fn window_out_of_range(days: i64) -> AppError {
    AppError::Internal(anyhow::anyhow!(
        "Redeem window of {} days is out of range",
        days
    ))
}

/// Pending records eligible for this run: codes added within the window,
/// oldest code first, at most `limit`.
pub fn select_pending(
    mut records: Vec<RedeemedCode>,
    window_start: &str,
    limit: usize,
) -> Vec<RedeemedCode> {
    records.retain(|r| r.status == RedeemStatus::NotRedeemed && r.added_at() >= window_start);
    records.sort_by(|a, b| {
        a.added_at()
            .cmp(b.added_at())
            .then_with(|| a.code.cmp(&b.code))
    });
    records.truncate(limit);
    records
}

/// Code exchange for a single user, independent of storage.
pub struct RedeemJob<'a> {
    hoyolab: &'a HoyolabClient,
}

impl<'a> RedeemJob<'a> {
    pub fn new(hoyolab: &'a HoyolabClient) -> Self {
        Self { hoyolab }
    }

    pub async fn redeem(
        &self,
        settings: &UserSettings,
        credentials: &HoyolabCredentials,
        record: &RedeemedCode,
    ) -> RedeemAttempt {
        let request = RedeemRequest {
            uid: settings.uid.clone(),
            region: settings.region.clone(),
            lang: settings.lang.clone(),
            cdkey: record.code.clone(),
            game_biz: settings.game_biz.clone(),
            s_lang_key: settings.s_lang_key.clone(),
        };

        let answer = match self
            .hoyolab
            .redeem_code(&credentials.redeem_cookie(), &request)
            .await
        {
            Ok(answer) => answer,
            Err(error) => return RedeemAttempt::Unanswered { error },
        };

        let (status, log_status, fallback) = if answer.is_success() {
            (RedeemStatus::Redeemed, LogStatus::Redeemed, "Successfully redeemed")
        } else {
            (RedeemStatus::Failed, LogStatus::Failed, "Failed to redeem")
        };

        let message = if answer.message.is_empty() {
            fallback.to_string()
        } else {
            answer.message
        };

        tracing::info!(
            user_id = %record.user_id,
            code = %record.code,
            retcode = answer.retcode,
            status = status.as_str(),
            "Redeem code answered"
        );

        let log = LogEntry::redeem(&record.user_id, &record.code, log_status, message);
        let record = RedeemedCode {
            status,
            updated_at: log.created_at.clone(),
            ..record.clone()
        };

        RedeemAttempt::Answered { record, log }
    }
}

/// Sync, select and redeem codes for one user. The caller holds the lock.
async fn process_user(state: &AppState, user_id: &str) -> Result<RedeemReport, AppError> {
    let now = Utc::now();
    let window = window_start(now, state.config.redeem_window_days)
        .ok_or_else(|| window_out_of_range(state.config.redeem_window_days))?;

    sync_active_codes(&state.db, user_id, &window, &format_utc_rfc3339(now)).await?;

    let Some(settings) = state.db.get_settings(user_id).await? else {
        tracing::debug!(user_id, "No settings, skipping redemption");
        return Ok(RedeemReport::default());
    };

    let credentials =
        decrypt_credentials(&state.kms, user_id, &settings.credentials_encrypted).await?;
    if !credentials.can_redeem() {
        tracing::debug!(user_id, "Incomplete cookies, skipping redemption");
        return Ok(RedeemReport::default());
    }

    let records = state.db.list_redeemed_codes(user_id).await?;
    let pending = select_pending(records, &window, state.config.redeem_codes_per_run);

    let job = RedeemJob::new(&state.hoyolab);
    let cooldown = Duration::from_secs(state.config.redeem_cooldown_secs);
    let mut report = RedeemReport {
        users: 1,
        ..Default::default()
    };

    for (i, record) in pending.iter().enumerate() {
        if i > 0 && !cooldown.is_zero() {
            tokio::time::sleep(cooldown).await;
        }

        report.attempted += 1;
        match job.redeem(&settings, &credentials, record).await {
            RedeemAttempt::Answered { record, log } => {
                if record.status == RedeemStatus::Redeemed {
                    report.redeemed += 1;
                } else {
                    report.failed += 1;
                }

                if let Err(e) = state.db.set_redeemed_code(&record).await {
                    tracing::warn!(
                        user_id,
                        code = %record.code,
                        error = %e,
                        "Failed to store redeem status"
                    );
                }
                record_logs(&state.db, std::slice::from_ref(&log)).await;
            }
            RedeemAttempt::Unanswered { error } => {
                tracing::warn!(
                    user_id,
                    code = %record.code,
                    error = %error,
                    "Redeem request failed, code stays pending"
                );
                if error.is_rate_limited() {
                    break;
                }
            }
        }
    }

    Ok(report)
}

/// Scheduled redemption for every user.
pub async fn run_redeem_codes(state: &AppState) -> Result<RedeemReport, AppError> {
    let users = state.db.list_users().await?;
    tracing::info!(users = users.len(), "Starting redeem code run");

    let mut report = RedeemReport::default();
    for user in &users {
        let Some(_guard) = state.job_locks.try_acquire(JobKind::Redeem, &user.id) else {
            tracing::info!(user_id = %user.id, "Redemption already running, skipping");
            continue;
        };

        match process_user(state, &user.id).await {
            Ok(user_report) => report.add(&user_report),
            Err(e) => {
                tracing::error!(user_id = %user.id, error = %e, "Redeem run failed for user")
            }
        }
    }

    tracing::info!(
        users = report.users,
        attempted = report.attempted,
        redeemed = report.redeemed,
        failed = report.failed,
        "Redeem code run finished"
    );
    Ok(report)
}

/// Redemption triggered by a user from the dashboard.
pub async fn run_redeem_for(state: &AppState, user_id: &str) -> Result<RedeemReport, AppError> {
    let _guard = state
        .job_locks
        .try_acquire(JobKind::Redeem, user_id)
        .ok_or_else(|| AppError::Conflict(ALREADY_RUNNING.to_string()))?;

    if state.db.get_settings(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("Settings for user {}", user_id)));
    }

    process_user(state, user_id).await
}
