//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Per-user settings (keyed by user_id)
    pub const SETTINGS: &str = "settings";
    /// Known redeem codes (keyed by code)
    pub const REDEEM_CODES: &str = "redeem_codes";
    /// Per-user redemption state (keyed by `{user_id}_{code}`)
    pub const REDEEMED_CODES: &str = "redeemed_codes";
    pub const LOGS: &str = "logs";
}
