// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Job log rows shown on the dashboard.

use serde::{Deserialize, Serialize};

/// Outcome recorded on a log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogStatus {
    Success,
    Error,
    Redeemed,
    Failed,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::Success => "SUCCESS",
            LogStatus::Error => "ERROR",
            LogStatus::Redeemed => "REDEEMED",
            LogStatus::Failed => "FAILED",
        }
    }
}

/// Which job wrote the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    DailyCheckIn,
    RedeemCode,
}

impl LogType {
    /// Stored (serialized) value, used in Firestore filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::DailyCheckIn => "DAILY_CHECK_IN",
            LogType::RedeemCode => "REDEEM_CODE",
        }
    }
}

/// Log document stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Document ID (UUID v4)
    pub id: String,
    /// Owner, or "Unknown" when the failure happened before a user was known
    pub user_id: String,
    pub message: String,
    pub status: LogStatus,
    pub log_type: LogType,
    /// Redeem code the row refers to (redeem logs only)
    #[serde(default)]
    pub code: Option<String>,
    pub created_at: String,
}

impl LogEntry {
    pub fn new(
        user_id: &str,
        log_type: LogType,
        status: LogStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            message: message.into(),
            status,
            log_type,
            code: None,
            created_at: crate::time_utils::now_rfc3339(),
        }
    }

    pub fn check_in_success(user_id: &str, message: impl Into<String>) -> Self {
        Self::new(user_id, LogType::DailyCheckIn, LogStatus::Success, message)
    }

    pub fn check_in_error(user_id: &str, message: impl Into<String>) -> Self {
        Self::new(user_id, LogType::DailyCheckIn, LogStatus::Error, message)
    }

    pub fn redeem(
        user_id: &str,
        code: &str,
        status: LogStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: Some(code.to_string()),
            ..Self::new(user_id, LogType::RedeemCode, status, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_type_as_str_matches_serde() {
        for log_type in [LogType::DailyCheckIn, LogType::RedeemCode] {
            let json = serde_json::to_string(&log_type).unwrap();
            assert_eq!(json, format!("\"{}\"", log_type.as_str()));
        }
    }

    #[test]
    fn test_redeem_log_carries_code() {
        let entry = LogEntry::redeem("u1", "GENSHINGIFT", LogStatus::Redeemed, "ok");

        assert_eq!(entry.code.as_deref(), Some("GENSHINGIFT"));
        assert_eq!(entry.log_type, LogType::RedeemCode);
        assert!(entry.created_at.ends_with('Z'));
        assert_ne!(entry.id, LogEntry::check_in_error("u1", "x").id);
    }
}
