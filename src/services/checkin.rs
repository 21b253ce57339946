// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Daily check-in job.
//!
//! For every user with settings:
//! 1. Validate that all cookies and the event ID are present
//! 2. Verify the HoYoLAB session
//! 3. List the Genshin Impact accounts
//! 4. Sign in each account, one after the other
//!
//! Every step writes a log row; failures never stop the run for other users.

use crate::error::AppError;
use crate::models::{HoyolabCredentials, LogEntry, UserSettings};
use crate::services::hoyolab::HoyolabClient;
use crate::services::jobs::{record_logs, JobKind};
use crate::services::kms::decrypt_credentials;
use crate::AppState;
use serde::Serialize;

const COMPLETED_MESSAGE: &str = "Genshin Impact Daily Check-in process completed";
const USER_COMPLETED_MESSAGE: &str = "Check-in completed successfully";
const ALREADY_RUNNING: &str = "Check-in already running";

/// Outcome of a check-in run, returned by the cron and manual routes.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckInReport {
    pub message: String,
    pub results: Vec<CheckInResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<CheckInError>,
}

/// Users that reached the account loop.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckInResult {
    pub user_id: String,
    pub message: String,
    /// One message per game account
    pub accounts: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckInError {
    pub user_id: String,
    pub error: String,
}

/// Everything one user's run produced.
#[derive(Debug, Default)]
pub struct UserCheckIn {
    pub result: Option<CheckInResult>,
    pub errors: Vec<CheckInError>,
    pub logs: Vec<LogEntry>,
}

impl UserCheckIn {
    /// Run stopped before any account: one error log and one report error.
    fn failed(user_id: &str, message: String) -> Self {
        Self {
            result: None,
            errors: vec![CheckInError {
                user_id: user_id.to_string(),
                error: message.clone(),
            }],
            logs: vec![LogEntry::check_in_error(user_id, message)],
        }
    }
}

/// Check-in for a single user, independent of storage.
pub struct CheckInJob<'a> {
    hoyolab: &'a HoyolabClient,
}

impl<'a> CheckInJob<'a> {
    pub fn new(hoyolab: &'a HoyolabClient) -> Self {
        Self { hoyolab }
    }

    pub async fn run_for_user(
        &self,
        settings: &UserSettings,
        credentials: &HoyolabCredentials,
    ) -> UserCheckIn {
        let user_id = settings.user_id.as_str();

        let missing = credentials.missing_fields(&settings.act_id);
        if !missing.is_empty() {
            tracing::info!(user_id, ?missing, "Skipping check-in: missing settings");
            return UserCheckIn::failed(user_id, "Missing required settings".to_string());
        }

        let cookie = credentials.check_in_cookie();

        let valid = self.hoyolab.verify_cookie(&cookie).await.unwrap_or_else(|e| {
            tracing::warn!(user_id, error = %e, "Cookie verification failed");
            false
        });
        if !valid {
            return UserCheckIn::failed(user_id, "Invalid Hoyolab cookie".to_string());
        }

        let accounts = self
            .hoyolab
            .get_game_accounts(&cookie)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(user_id, error = %e, "Failed to list game accounts");
                Vec::new()
            });
        if accounts.is_empty() {
            return UserCheckIn::failed(user_id, "No Genshin Impact account found".to_string());
        }

        let mut run = UserCheckIn::default();
        let mut messages = Vec::with_capacity(accounts.len());

        for account in &accounts {
            match self
                .hoyolab
                .check_in(&cookie, &settings.act_id, account)
                .await
            {
                Ok(outcome) => {
                    let message = outcome.message();
                    tracing::info!(
                        user_id,
                        game_uid = %account.game_uid,
                        success = outcome.is_success(),
                        "Check-in finished"
                    );
                    run.logs.push(if outcome.is_success() {
                        LogEntry::check_in_success(user_id, message.clone())
                    } else {
                        LogEntry::check_in_error(user_id, message.clone())
                    });
                    messages.push(message);
                }
                Err(e) => {
                    let message = match e {
                        AppError::Hoyolab(msg) => msg,
                        other => other.to_string(),
                    };
                    tracing::warn!(
                        user_id,
                        game_uid = %account.game_uid,
                        error = %message,
                        "Check-in failed"
                    );
                    run.logs.push(LogEntry::check_in_error(user_id, message.clone()));
                    run.errors.push(CheckInError {
                        user_id: user_id.to_string(),
                        error: message,
                    });
                }
            }
        }

        run.result = Some(CheckInResult {
            user_id: user_id.to_string(),
            message: USER_COMPLETED_MESSAGE.to_string(),
            accounts: messages,
        });
        run
    }
}

/// Decrypt, run and persist the check-in for one user. The caller holds the lock.
async fn process_user(state: &AppState, settings: &UserSettings) -> UserCheckIn {
    let user_id = settings.user_id.as_str();

    let run = match decrypt_credentials(&state.kms, user_id, &settings.credentials_encrypted).await
    {
        Ok(credentials) => {
            CheckInJob::new(&state.hoyolab)
                .run_for_user(settings, &credentials)
                .await
        }
        Err(e) => UserCheckIn::failed(user_id, format!("Error processing : {}", e)),
    };

    record_logs(&state.db, &run.logs).await;
    run
}

fn build_report(runs: Vec<UserCheckIn>) -> CheckInReport {
    let mut report = CheckInReport {
        message: COMPLETED_MESSAGE.to_string(),
        results: Vec::new(),
        errors: Vec::new(),
    };

    for run in runs {
        report.results.extend(run.result);
        report.errors.extend(run.errors);
    }
    report
}

/// Scheduled check-in for every user with settings.
pub async fn run_daily_check_in(state: &AppState) -> Result<CheckInReport, AppError> {
    let all_settings = state.db.list_settings().await?;
    if all_settings.is_empty() {
        return Err(AppError::NotFound(
            "No settings found in database".to_string(),
        ));
    }

    tracing::info!(users = all_settings.len(), "Starting daily check-in");

    let mut runs = Vec::with_capacity(all_settings.len());
    for settings in &all_settings {
        let Some(_guard) = state
            .job_locks
            .try_acquire(JobKind::CheckIn, &settings.user_id)
        else {
            tracing::info!(user_id = %settings.user_id, "Check-in already running, skipping");
            runs.push(UserCheckIn {
                errors: vec![CheckInError {
                    user_id: settings.user_id.clone(),
                    error: ALREADY_RUNNING.to_string(),
                }],
                ..Default::default()
            });
            continue;
        };

        runs.push(process_user(state, settings).await);
    }

    let report = build_report(runs);
    tracing::info!(
        completed = report.results.len(),
        errors = report.errors.len(),
        "Daily check-in finished"
    );
    Ok(report)
}

/// Check-in triggered by a user from the dashboard.
pub async fn run_check_in_for(state: &AppState, user_id: &str) -> Result<CheckInReport, AppError> {
    let _guard = state
        .job_locks
        .try_acquire(JobKind::CheckIn, user_id)
        .ok_or_else(|| AppError::Conflict(ALREADY_RUNNING.to_string()))?;

    let settings = state
        .db
        .get_settings(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Settings for user {}", user_id)))?;

    let run = process_user(state, &settings).await;
    Ok(build_report(vec![run]))
}
