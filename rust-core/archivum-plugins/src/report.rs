// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Execution accounting: live counters, progress snapshots and the final
//! report.

use std::sync::atomic::{AtomicU64, Ordering};

use archivum_index::EntityType;
use archivum_model::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

/// Overall outcome of a plugin over its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginState {
    Success,
    Failure,
    PartialSuccess,
}

impl PluginState {
    /// `Success` iff nothing failed (so an empty batch succeeds), `Failure`
    /// if nothing succeeded, `PartialSuccess` otherwise.
    pub fn from_counts(success: u64, failure: u64) -> Self {
        if failure == 0 {
            PluginState::Success
        } else if success == 0 {
            PluginState::Failure
        } else {
            PluginState::PartialSuccess
        }
    }
}

/// Engine lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    #[default]
    Initialized,
    BeforeAll,
    Executing,
    AfterAll,
    Shutdown,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFailure {
    pub id: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// A consistent view of the counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub phase: EngineState,
    pub total: u64,
    pub success: u64,
    pub failure: u64,
}

impl Progress {
    pub fn processed(&self) -> u64 {
        self.success + self.failure
    }

    /// Completion in percent, 100 for an empty batch.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.processed() * 100) / self.total).min(100) as u8
    }
}

/// Live per-job counters shared by the workers.
#[derive(Debug)]
pub struct JobPluginInfo {
    total: u64,
    success: AtomicU64,
    failure: AtomicU64,
    failures: Mutex<Vec<ObjectFailure>>,
}

impl JobPluginInfo {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn record_success(&self) {
        self.success.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn record_failure(&self, failure: ObjectFailure) {
        // Detail first, so a reader never sees a count without its detail.
        self.failures.lock().await.push(failure);
        self.failure.fetch_add(1, Ordering::SeqCst);
    }

    pub fn snapshot(&self, phase: EngineState) -> Progress {
        Progress {
            phase,
            total: self.total,
            success: self.success.load(Ordering::SeqCst),
            failure: self.failure.load(Ordering::SeqCst),
        }
    }

    pub async fn failures(&self) -> Vec<ObjectFailure> {
        self.failures.lock().await.clone()
    }
}

/// The final account of one plugin execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub plugin_id: String,
    pub plugin_name: String,
    pub plugin_version: String,
    pub target: EntityType,
    pub total: u64,
    pub success: u64,
    pub failure: u64,
    pub state: PluginState,
    pub details: String,
    pub failures: Vec<ObjectFailure>,
    /// Error from the after-all phase. Does not affect per-object results.
    pub maintenance_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl Report {
    pub fn unprocessed(&self) -> u64 {
        self.total.saturating_sub(self.success + self.failure)
    }
}
