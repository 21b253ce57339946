// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HoYoLAB Autopilot API Server
//!
//! Runs the daily Genshin Impact check-in and redeems promotional codes
//! for every configured user, driven by an external cron scheduler.

use hoyolab_autopilot::{
    config::Config,
    db::FirestoreDb,
    services::{HoyolabClient, JobLocks, KmsService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting HoYoLAB Autopilot API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    // Initialize KMS service
    let kms = KmsService::new(
        &config.gcp_project_id,
        &config.gcp_region,
        KmsService::CREDENTIALS_KEY_NAME,
    )
    .await?;
    tracing::info!("KMS service initialized");

    let hoyolab = HoyolabClient::new(config.hoyolab.clone(), &config.user_agent)?;

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        kms,
        hoyolab,
        job_locks: JobLocks::new(),
    });

    // Build router
    let app = hoyolab_autopilot::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("hoyolab_autopilot=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
