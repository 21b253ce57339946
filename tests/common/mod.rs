// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use hoyolab_autopilot::config::{Config, HoyolabEndpoints};
use hoyolab_autopilot::db::FirestoreDb;
use hoyolab_autopilot::middleware::auth::create_jwt;
use hoyolab_autopilot::routes::create_router;
use hoyolab_autopilot::services::{HoyolabClient, JobLocks, KmsService};
use hoyolab_autopilot::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

fn build_app(config: Config, db: FirestoreDb) -> (axum::Router, Arc<AppState>) {
    let hoyolab = HoyolabClient::new(config.hoyolab.clone(), &config.user_agent)
        .expect("Failed to build HoYoLAB client");

    let state = Arc::new(AppState {
        config,
        db,
        kms: KmsService::new_mock(),
        hoyolab,
        job_locks: JobLocks::new(),
    });

    (create_router(state.clone()), state)
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    build_app(Config::test_default(), test_db_offline())
}

/// Create an emulator-backed app in a project of its own, so the test sees
/// an empty database. `configure` adjusts the test config first.
#[allow(dead_code)]
pub async fn create_isolated_app(
    base_url: &str,
    configure: impl FnOnce(&mut Config),
) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.hoyolab = HoyolabEndpoints::all(base_url);
    configure(&mut config);

    let project = format!("test-{}", &uuid::Uuid::new_v4().simple().to_string()[..16]);
    let db = FirestoreDb::new(&project)
        .await
        .expect("Failed to connect to Firestore emulator");
    build_app(config, db)
}

/// Session token for `user_id`, signed with the test key.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, config: &Config) -> String {
    create_jwt(user_id, &config.jwt_signing_key).expect("Failed to create JWT")
}

/// `Authorization` header value the scheduler sends.
#[allow(dead_code)]
pub fn cron_auth_header(config: &Config) -> String {
    format!("Bearer {}", config.cron_secret)
}

/// Unique ID for test isolation in the shared emulator.
#[allow(dead_code)]
pub fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
