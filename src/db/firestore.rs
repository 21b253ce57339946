// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage)
//! - Settings (HoYoLAB account settings and encrypted cookies)
//! - Redeem codes (shared catalogue of codes)
//! - Redeemed codes (per-user redemption state)
//! - Logs (job outcomes shown on the dashboard)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{LogEntry, LogType, RedeemCode, RedeemedCode, User, UserSettings};
use firestore::errors::FirestoreError;
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// Document ID of a user's redemption record.
pub fn redeemed_code_doc_id(user_id: &str, code: &str) -> String {
    format!(
        "{}_{}",
        urlencoding::encode(user_id),
        urlencoding::encode(code)
    )
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator takes an unauthenticated connection.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get every user.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: User = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Settings Operations ─────────────────────────────────────

    /// Get the settings of one user.
    pub async fn get_settings(&self, user_id: &str) -> Result<Option<UserSettings>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SETTINGS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the settings of every user.
    pub async fn list_settings(&self) -> Result<Vec<UserSettings>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::SETTINGS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or replace a user's settings.
    pub async fn upsert_settings(&self, settings: &UserSettings) -> Result<(), AppError> {
        let _: UserSettings = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SETTINGS)
            .document_id(&settings.user_id)
            .object(settings)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Redeem Code Operations ──────────────────────────────────

    /// Add a code to the catalogue.
    ///
    /// Returns `false` if the code was already known (the stored record is
    /// left untouched).
    pub async fn add_redeem_code(&self, code: &RedeemCode) -> Result<bool, AppError> {
        let result: Result<RedeemCode, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::REDEEM_CODES)
            .document_id(urlencoding::encode(&code.code))
            .object(code)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(FirestoreError::DataConflictError(_)) => Ok(false),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    /// Codes created after `cutoff` (RFC3339), oldest first.
    pub async fn list_redeem_codes_since(&self, cutoff: &str) -> Result<Vec<RedeemCode>, AppError> {
        let cutoff = cutoff.to_string();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::REDEEM_CODES)
            .filter(move |q| q.field("created_at").greater_than(cutoff.clone()))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Redeemed Code Operations ────────────────────────────────

    /// Make sure `user_id` has a redemption record for each code.
    ///
    /// Missing records are created as pending; existing ones are never
    /// overwritten. Returns how many records were created.
    pub async fn ensure_redeemed_codes(
        &self,
        user_id: &str,
        codes: &[RedeemCode],
        now: &str,
    ) -> Result<usize, AppError> {
        let client = self.get_client()?;

        let created = stream::iter(codes.iter().cloned())
            .map(|code| async move {
                let record = RedeemedCode::pending(user_id, &code, now);
                let result: Result<RedeemedCode, FirestoreError> = client
                    .fluent()
                    .insert()
                    .into(collections::REDEEMED_CODES)
                    .document_id(redeemed_code_doc_id(user_id, &code.code))
                    .object(&record)
                    .execute()
                    .await;

                match result {
                    Ok(_) => Ok(true),
                    Err(FirestoreError::DataConflictError(_)) => Ok(false),
                    Err(e) => Err(AppError::Database(e.to_string())),
                }
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<bool, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<bool>, AppError>>()?;

        Ok(created.into_iter().filter(|c| *c).count())
    }

    /// All redemption records of one user.
    pub async fn list_redeemed_codes(&self, user_id: &str) -> Result<Vec<RedeemedCode>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REDEEMED_CODES)
            .filter(|q| q.for_all([q.field("user_id").eq(user_id)]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a redemption record (status changes).
    pub async fn set_redeemed_code(&self, record: &RedeemedCode) -> Result<(), AppError> {
        let _: RedeemedCode = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::REDEEMED_CODES)
            .document_id(redeemed_code_doc_id(&record.user_id, &record.code))
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Log Operations ──────────────────────────────────────────

    /// Append a log row.
    pub async fn insert_log(&self, entry: &LogEntry) -> Result<(), AppError> {
        let _: LogEntry = self
            .get_client()?
            .fluent()
            .insert()
            .into(collections::LOGS)
            .document_id(&entry.id)
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Latest log rows of one kind for a user, newest first.
    pub async fn list_logs(
        &self,
        user_id: &str,
        log_type: LogType,
        limit: u32,
    ) -> Result<Vec<LogEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::LOGS)
            .filter(|q| {
                q.for_all([
                    q.field("user_id").eq(user_id),
                    q.field("log_type").eq(log_type.as_str()),
                ])
            })
            .order_by([("created_at", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
