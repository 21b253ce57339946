// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Redeem codes and per-user redemption state.

use serde::{Deserialize, Serialize};

const MIN_CODE_LEN: usize = 8;
const MAX_CODE_LEN: usize = 16;

/// A promotional code known to the system (shared by all users).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemCode {
    /// Normalized code (also the document ID)
    pub code: String,
    /// Where the code came from ("manual", a site name, ...)
    pub source: String,
    pub created_at: String,
}

/// Redemption state of one code for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedeemStatus {
    NotRedeemed,
    Redeemed,
    Failed,
}

impl RedeemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedeemStatus::NotRedeemed => "NOT_REDEEMED",
            RedeemStatus::Redeemed => "REDEEMED",
            RedeemStatus::Failed => "FAILED",
        }
    }
}

/// Per-user record of a code, keyed by `{user_id}_{code}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemedCode {
    pub user_id: String,
    pub code: String,
    pub status: RedeemStatus,
    /// When the code entered the catalogue (copied from [`RedeemCode`])
    #[serde(default)]
    pub code_created_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl RedeemedCode {
    /// Fresh pending record of `code` for a user.
    pub fn pending(user_id: &str, code: &RedeemCode, now: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            code: code.code.clone(),
            status: RedeemStatus::NotRedeemed,
            code_created_at: code.created_at.clone(),
            created_at: now.to_string(),
            updated_at: now.to_string(),
        }
    }

    /// Age of the code itself. Records written before the catalogue
    /// timestamp was copied fall back to their own creation time.
    pub fn added_at(&self) -> &str {
        if self.code_created_at.is_empty() {
            &self.created_at
        } else {
            &self.code_created_at
        }
    }
}

/// Normalize user input into a redeem code.
///
/// Codes are 8 to 16 characters of ASCII letters, digits and hyphens.
/// Returns `None` when the input cannot be a code.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_ascii_uppercase();
    let valid_len = (MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len());
    let valid_chars = code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

    (valid_len && valid_chars).then_some(code)
}
