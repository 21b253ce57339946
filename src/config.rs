// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets (JWT key, cron secret) come from the environment as well; the
//! deployment injects them through secret bindings.

use std::env;

/// Default browser user agent sent to HoYoLAB when `USER_AGENT` is unset.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Base URLs of the HoYoLAB / HoYoverse hosts the client talks to.
#[derive(Debug, Clone)]
pub struct HoyolabEndpoints {
    /// Account service (cookie verification)
    pub account_api: String,
    /// Takumi service (game role bindings)
    pub takumi_api: String,
    /// Daily sign-in event service
    pub sol_api: String,
    /// Redeem code (cdkey) exchange service
    pub cdkey_api: String,
}

impl Default for HoyolabEndpoints {
    fn default() -> Self {
        Self {
            account_api: "https://api-account-os.hoyolab.com".to_string(),
            takumi_api: "https://api-os-takumi.hoyolab.com".to_string(),
            sol_api: "https://sg-hk4e-api.hoyolab.com".to_string(),
            cdkey_api: "https://public-operation-hk4e.hoyoverse.com".to_string(),
        }
    }
}

impl HoyolabEndpoints {
    /// Point every endpoint at the same base URL (mock servers in tests).
    pub fn all(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            account_api: base.clone(),
            takumi_api: base.clone(),
            sol_api: base.clone(),
            cdkey_api: base,
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore and KMS)
    pub gcp_project_id: String,
    /// GCP region for the KMS key ring
    pub gcp_region: String,
    /// Server port
    pub port: u16,
    /// User agent sent with every HoYoLAB request
    pub user_agent: String,
    /// Log message redaction applied when logs are read back
    pub replace_from: Option<String>,
    pub replace_to: String,
    /// Redeem codes older than this many days are ignored
    pub redeem_window_days: i64,
    /// Maximum codes redeemed per user per job run
    pub redeem_codes_per_run: usize,
    /// Pause between two redemptions for the same user
    pub redeem_cooldown_secs: u64,
    /// HoYoLAB base URLs
    pub hoyolab: HoyolabEndpoints,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// Bearer secret the scheduler presents on `/api/cron/*`
    pub cron_secret: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-west1".to_string()),
            port: parse_or("PORT", 8080)?,
            user_agent: env::var("USER_AGENT")
                .map(|v| v.trim().to_string())
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            replace_from: env::var("REPLACE_FROM").ok().filter(|v| !v.is_empty()),
            replace_to: env::var("REPLACE_TO").unwrap_or_default(),
            redeem_window_days: check_window_days(parse_or("REDEEM_WINDOW_DAYS", 30)?)?,
            redeem_codes_per_run: parse_or("REDEEM_CODES_PER_RUN", 1)?,
            redeem_cooldown_secs: parse_or("REDEEM_COOLDOWN_SECS", 5)?,
            hoyolab: HoyolabEndpoints::default(),

            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            cron_secret: env::var("CRON_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CRON_SECRET"))?,
        })
    }

    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-west1".to_string(),
            port: 8080,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            replace_from: None,
            replace_to: String::new(),
            redeem_window_days: 30,
            redeem_codes_per_run: 1,
            redeem_cooldown_secs: 0,
            hoyolab: HoyolabEndpoints::default(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            cron_secret: "test_cron_secret".to_string(),
        }
    }

    /// Apply the configured `REPLACE_FROM` -> `REPLACE_TO` substitution.
    ///
    /// Only the first occurrence is replaced.
    pub fn redact(&self, message: &str) -> String {
        match self.replace_from.as_deref() {
            Some(from) => message.replacen(from, &self.replace_to, 1),
            None => message.to_string(),
        }
    }
}

/// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Accepted range for `REDEEM_WINDOW_DAYS`.
const REDEEM_WINDOW_DAYS_RANGE: std::ops::RangeInclusive<i64> = 1..=3650;

fn check_window_days(days: i64) -> Result<i64, ConfigError> {
    if REDEEM_WINDOW_DAYS_RANGE.contains(&days) {
        Ok(days)
    } else {
        Err(ConfigError::Invalid("REDEEM_WINDOW_DAYS"))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
