// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! HoYoLAB Autopilot: keep Genshin Impact accounts checked in and redeemed
//!
//! This crate provides the backend API that runs the daily HoYoLAB check-in
//! and redeems promotional codes for every configured user.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{HoyolabClient, JobLocks, KmsService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub kms: KmsService,
    pub hoyolab: HoyolabClient,
    pub job_locks: JobLocks,
}
