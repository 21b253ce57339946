// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::redeem::normalize_code;
use crate::models::settings::{DEFAULT_LANG, DEFAULT_REGION, DEFAULT_S_LANG_KEY};
use crate::models::{HoyolabCredentials, LogEntry, LogType, RedeemCode, User, UserSettings};
use crate::services::checkin::{run_check_in_for, CheckInReport};
use crate::services::hoyolab::GENSHIN_GLOBAL_BIZ;
use crate::services::kms::encrypt_credentials;
use crate::services::redeem::{run_redeem_for, window_out_of_range, RedeemReport};
use crate::time_utils::{now_rfc3339, window_start};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/api/logs", get(get_logs))
        .route("/api/redeem-codes", get(list_codes).post(add_code))
        .route("/api/check-in", post(trigger_check_in))
        .route("/api/redeem", post(trigger_redeem))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub created_at: String,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    Ok(Json(UserResponse {
        id: profile.id,
        name: profile.name,
        email: profile.email,
        created_at: profile.created_at,
    }))
}

// ─── Settings ────────────────────────────────────────────────

/// Settings as shown to the dashboard. Cookies are never returned.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SettingsResponse {
    pub uid: String,
    pub region: String,
    pub lang: String,
    pub game_biz: String,
    pub s_lang_key: String,
    pub act_id: String,
    pub credentials_configured: bool,
    pub updated_at: Option<String>,
}

impl SettingsResponse {
    fn from_settings(settings: &UserSettings) -> Self {
        Self {
            uid: settings.uid.clone(),
            region: settings.region.clone(),
            lang: settings.lang.clone(),
            game_biz: settings.game_biz.clone(),
            s_lang_key: settings.s_lang_key.clone(),
            act_id: settings.act_id.clone(),
            credentials_configured: !settings.credentials_encrypted.is_empty(),
            updated_at: Some(settings.updated_at.clone()),
        }
    }

    /// What a user without saved settings sees.
    fn defaults() -> Self {
        Self {
            uid: String::new(),
            region: DEFAULT_REGION.to_string(),
            lang: DEFAULT_LANG.to_string(),
            game_biz: GENSHIN_GLOBAL_BIZ.to_string(),
            s_lang_key: DEFAULT_S_LANG_KEY.to_string(),
            act_id: String::new(),
            credentials_configured: false,
            updated_at: None,
        }
    }
}

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SettingsResponse>> {
    let response = match state.db.get_settings(&user.user_id).await? {
        Some(settings) => SettingsResponse::from_settings(&settings),
        None => SettingsResponse::defaults(),
    };
    Ok(Json(response))
}

fn validate_uid(uid: &str) -> std::result::Result<(), ValidationError> {
    if uid.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("uid_digits").with_message("UID must be numeric".into()))
    }
}

/// Reject values that are empty once trimmed.
fn validate_not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank").with_message("Value must not be blank".into()))
    } else {
        Ok(())
    }
}

/// HoYoLAB cookies as pasted from the browser.
#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CredentialsInput {
    #[validate(length(min = 1, max = 4096), custom(function = "validate_not_blank"))]
    pub cookie_token_v2: String,
    #[validate(length(min = 1, max = 256), custom(function = "validate_not_blank"))]
    pub account_mid_v2: String,
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub account_id_v2: String,
    #[validate(length(min = 1, max = 4096), custom(function = "validate_not_blank"))]
    pub ltoken_v2: String,
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub ltuid_v2: String,
}

impl From<CredentialsInput> for HoyolabCredentials {
    fn from(input: CredentialsInput) -> Self {
        Self {
            cookie_token_v2: input.cookie_token_v2.trim().to_string(),
            account_mid_v2: input.account_mid_v2.trim().to_string(),
            account_id_v2: input.account_id_v2.trim().to_string(),
            ltoken_v2: input.ltoken_v2.trim().to_string(),
            ltuid_v2: input.ltuid_v2.trim().to_string(),
        }
    }
}

/// Settings update. Omitted optional fields keep their stored value (defaults
/// on create); omitted `credentials` keep the stored cookies.
#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SettingsRequest {
    #[validate(
        length(min = 1, max = 20, message = "UID must be 1 to 20 digits"),
        custom(function = "validate_uid")
    )]
    pub uid: String,
    #[validate(length(min = 1, max = 64), custom(function = "validate_not_blank"))]
    pub act_id: String,
    #[validate(length(min = 1, max = 32))]
    pub region: Option<String>,
    #[validate(length(min = 1, max = 16))]
    pub lang: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub game_biz: Option<String>,
    #[validate(length(min = 1, max = 16))]
    pub s_lang_key: Option<String>,
    #[validate(nested)]
    pub credentials: Option<CredentialsInput>,
}

async fn put_settings(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<SettingsRequest>,
) -> Result<Json<SettingsResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let now = now_rfc3339();

    if state.db.get_user(&user.user_id).await?.is_none() {
        tracing::info!(user_id = %user.user_id, "Creating user on first settings save");
        state
            .db
            .upsert_user(&User {
                id: user.user_id.clone(),
                name: None,
                email: None,
                created_at: now.clone(),
            })
            .await?;
    }

    let existing = state.db.get_settings(&user.user_id).await?;

    // Omitted fields keep the stored value; defaults apply only on create.
    let (region, lang, game_biz, s_lang_key, stored_credentials) = match existing {
        Some(s) => (s.region, s.lang, s.game_biz, s.s_lang_key, s.credentials_encrypted),
        None => (
            DEFAULT_REGION.to_string(),
            DEFAULT_LANG.to_string(),
            GENSHIN_GLOBAL_BIZ.to_string(),
            DEFAULT_S_LANG_KEY.to_string(),
            String::new(),
        ),
    };

    let credentials_encrypted = match payload.credentials {
        Some(input) => {
            let credentials = HoyolabCredentials::from(input);
            encrypt_credentials(&state.kms, &user.user_id, &credentials).await?
        }
        None => stored_credentials,
    };

    let settings = UserSettings {
        user_id: user.user_id.clone(),
        uid: payload.uid.trim().to_string(),
        region: payload.region.unwrap_or(region),
        lang: payload.lang.unwrap_or(lang),
        game_biz: payload.game_biz.unwrap_or(game_biz),
        s_lang_key: payload.s_lang_key.unwrap_or(s_lang_key),
        act_id: payload.act_id.trim().to_string(),
        credentials_encrypted,
        updated_at: now,
    };

    state.db.upsert_settings(&settings).await?;
    tracing::info!(user_id = %user.user_id, "Settings saved");

    Ok(Json(SettingsResponse::from_settings(&settings)))
}

// ─── Logs ────────────────────────────────────────────────────

const DEFAULT_LOG_LIMIT: u32 = 50;
const MAX_LOG_LIMIT: u32 = 200;

#[derive(Deserialize)]
struct LogsQuery {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LogView {
    pub id: String,
    pub message: String,
    pub status: String,
    pub code: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LogsResponse {
    pub redeem_logs: Vec<LogView>,
    pub daily_check_in_logs: Vec<LogView>,
}

fn log_view(state: &AppState, entry: LogEntry) -> LogView {
    LogView {
        message: state.config.redact(&entry.message),
        status: entry.status.as_str().to_string(),
        code: entry.code.unwrap_or_default(),
        id: entry.id,
        created_at: entry.created_at,
    }
}

async fn get_logs(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LOG_LIMIT)
        .clamp(1, MAX_LOG_LIMIT);

    let redeem = state
        .db
        .list_logs(&user.user_id, LogType::RedeemCode, limit)
        .await?;
    let check_in = state
        .db
        .list_logs(&user.user_id, LogType::DailyCheckIn, limit)
        .await?;

    Ok(Json(LogsResponse {
        redeem_logs: redeem.into_iter().map(|e| log_view(&state, e)).collect(),
        daily_check_in_logs: check_in.into_iter().map(|e| log_view(&state, e)).collect(),
    }))
}

// ─── Redeem Codes ────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RedeemCodeView {
    pub code: String,
    pub source: String,
    pub created_at: String,
    /// Caller's redemption status; `None` until the next redeem run syncs it
    pub status: Option<String>,
}

/// Active codes with the caller's status.
async fn list_codes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<RedeemCodeView>>> {
    let window = window_start(chrono::Utc::now(), state.config.redeem_window_days)
        .ok_or_else(|| window_out_of_range(state.config.redeem_window_days))?;

    let codes = state.db.list_redeem_codes_since(&window).await?;
    let statuses: HashMap<String, &'static str> = state
        .db
        .list_redeemed_codes(&user.user_id)
        .await?
        .into_iter()
        .map(|r| (r.code, r.status.as_str()))
        .collect();

    Ok(Json(
        codes
            .into_iter()
            .map(|c| RedeemCodeView {
                status: statuses.get(&c.code).map(|s| s.to_string()),
                code: c.code,
                source: c.source,
                created_at: c.created_at,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AddCodeRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[validate(length(max = 64))]
    pub source: Option<String>,
}

/// Add a code to the shared catalogue.
async fn add_code(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AddCodeRequest>,
) -> Result<(StatusCode, Json<RedeemCodeView>)> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let code = normalize_code(&payload.code).ok_or_else(|| {
        AppError::BadRequest(
            "Redeem codes are 8 to 16 letters, digits or hyphens".to_string(),
        )
    })?;

    let record = RedeemCode {
        code,
        source: payload
            .source
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "manual".to_string()),
        created_at: now_rfc3339(),
    };

    if !state.db.add_redeem_code(&record).await? {
        return Err(AppError::Conflict(format!(
            "Code {} already exists",
            record.code
        )));
    }

    tracing::info!(user_id = %user.user_id, code = %record.code, "Redeem code added");

    Ok((
        StatusCode::CREATED,
        Json(RedeemCodeView {
            code: record.code,
            source: record.source,
            created_at: record.created_at,
            status: None,
        }),
    ))
}

// ─── Manual Triggers ─────────────────────────────────────────

async fn trigger_check_in(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<CheckInReport>> {
    tracing::info!(user_id = %user.user_id, "Manual check-in requested");
    Ok(Json(run_check_in_for(&state, &user.user_id).await?))
}

async fn trigger_redeem(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RedeemReport>> {
    tracing::info!(user_id = %user.user_id, "Manual redemption requested");
    Ok(Json(run_redeem_for(&state, &user.user_id).await?))
}
