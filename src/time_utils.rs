// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.
//!
//! Every timestamp we store is RFC3339 UTC with a `Z` suffix and whole
//! seconds, so string comparison in Firestore queries matches time order.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time in the stored timestamp format.
pub fn now_rfc3339() -> String {
    format_utc_rfc3339(Utc::now())
}

/// Start of the redeem-code window ending at `now`.
///
/// Returns `None` when `days` does not fit the calendar.
pub fn window_start(now: DateTime<Utc>, days: i64) -> Option<String> {
    let span = TimeDelta::try_days(days)?;
    now.checked_sub_signed(span).map(format_utc_rfc3339)
}
