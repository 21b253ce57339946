// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod log;
pub mod redeem;
pub mod settings;
pub mod user;

pub use log::{LogEntry, LogStatus, LogType};
pub use redeem::{RedeemCode, RedeemStatus, RedeemedCode};
pub use settings::{HoyolabCredentials, UserSettings};
pub use user::User;
