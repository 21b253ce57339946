// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod checkin;
pub mod hoyolab;
pub mod jobs;
pub mod kms;
pub mod redeem;

pub use checkin::{run_check_in_for, run_daily_check_in, CheckInJob, CheckInReport};
pub use hoyolab::HoyolabClient;
pub use jobs::{JobGuard, JobKind, JobLocks};
pub use kms::KmsService;
pub use redeem::{run_redeem_codes, run_redeem_for, RedeemJob, RedeemReport};
