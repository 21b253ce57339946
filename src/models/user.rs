//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// Dashboard user stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID (JWT subject, also used as document ID)
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Email address (may be None if not shared)
    #[serde(default)]
    pub email: Option<String>,
    /// When the user record was created
    pub created_at: String,
}
