// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plumbing shared by the jobs: per-user locks and log persistence.
//!
//! The scheduler and the dashboard can both start a job. A lock is held per
//! (job, user) for the duration of the run, so the same user's check-in or
//! redemption never runs twice at once within an instance.

use crate::db::FirestoreDb;
use crate::models::LogEntry;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Which job a lock protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    CheckIn,
    Redeem,
}

type LockKey = (JobKind, String);

/// Shared lock table for use in AppState.
#[derive(Clone, Default)]
pub struct JobLocks {
    running: Arc<DashMap<LockKey, ()>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `(kind, user_id)`, or `None` if the job is running.
    pub fn try_acquire(&self, kind: JobKind, user_id: &str) -> Option<JobGuard> {
        let key = (kind, user_id.to_string());
        match self.running.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(JobGuard {
                    running: self.running.clone(),
                    key,
                })
            }
        }
    }

    pub fn is_running(&self, kind: JobKind, user_id: &str) -> bool {
        self.running.contains_key(&(kind, user_id.to_string()))
    }
}

/// Held while a job runs; releases the lock on drop.
pub struct JobGuard {
    running: Arc<DashMap<LockKey, ()>>,
    key: LockKey,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.running.remove(&self.key);
    }
}

/// Store job log rows. Failures are traced and otherwise ignored.
pub async fn record_logs(db: &FirestoreDb, logs: &[LogEntry]) {
    for entry in logs {
        if let Err(e) = db.insert_log(entry).await {
            tracing::warn!(
                error = %e,
                user_id = %entry.user_id,
                log_type = entry.log_type.as_str(),
                "Failed to store job log"
            );
        }
    }
}
