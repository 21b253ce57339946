// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user HoYoLAB settings and credentials.

use serde::{Deserialize, Serialize};

/// Region used when the user does not pick one.
pub const DEFAULT_REGION: &str = "os_asia";
/// Language used when the user does not pick one.
pub const DEFAULT_LANG: &str = "en";
/// HoYoverse site language key used when the user does not pick one.
pub const DEFAULT_S_LANG_KEY: &str = "en-us";

/// Settings document stored in Firestore, keyed by user ID.
///
/// The cookie values are held in `credentials_encrypted`, a KMS-encrypted
/// JSON bundle of [`HoyolabCredentials`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: String,
    /// In-game UID the redeem codes are credited to
    pub uid: String,
    pub region: String,
    pub lang: String,
    pub game_biz: String,
    pub s_lang_key: String,
    /// Daily sign-in event ID
    pub act_id: String,
    /// Encrypted credential bundle (base64)
    #[serde(default)]
    pub credentials_encrypted: String,
    pub updated_at: String,
}

/// Decrypted HoYoLAB session cookies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoyolabCredentials {
    pub cookie_token_v2: String,
    pub account_mid_v2: String,
    pub account_id_v2: String,
    pub ltoken_v2: String,
    pub ltuid_v2: String,
}

impl HoyolabCredentials {
    /// Cookie header for HoYoLAB account and sign-in endpoints.
    pub fn check_in_cookie(&self) -> String {
        join_cookies(&[
            ("cookie_token_v2", &self.cookie_token_v2),
            ("account_mid_v2", &self.account_mid_v2),
            ("account_id_v2", &self.account_id_v2),
            ("ltoken_v2", &self.ltoken_v2),
            ("ltuid_v2", &self.ltuid_v2),
        ])
    }

    /// Cookie header for the cdkey exchange endpoint.
    pub fn redeem_cookie(&self) -> String {
        join_cookies(&[
            ("cookie_token_v2", &self.cookie_token_v2),
            ("account_mid_v2", &self.account_mid_v2),
            ("account_id_v2", &self.account_id_v2),
        ])
    }

    /// Names of required check-in fields that are blank.
    pub fn missing_fields(&self, act_id: &str) -> Vec<&'static str> {
        [
            ("cookie_token_v2", self.cookie_token_v2.as_str()),
            ("account_mid_v2", self.account_mid_v2.as_str()),
            ("account_id_v2", self.account_id_v2.as_str()),
            ("ltoken_v2", self.ltoken_v2.as_str()),
            ("ltuid_v2", self.ltuid_v2.as_str()),
            ("act_id", act_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Whether every cookie the cdkey endpoint needs is present.
    pub fn can_redeem(&self) -> bool {
        [
            &self.cookie_token_v2,
            &self.account_mid_v2,
            &self.account_id_v2,
        ]
        .iter()
        .all(|v| !v.trim().is_empty())
    }
}

fn join_cookies(pairs: &[(&str, &String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{}={}", name, value.trim()))
        .collect::<Vec<_>>()
        .join("; ")
}
