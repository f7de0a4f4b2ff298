// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Mutation notifications.

use async_trait::async_trait;

use crate::entities::{AipSnapshot, LogEntry, PreservationMetadata};

pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Receives every successful mutation of the store.
///
/// Called after the mutation is durable. A returned error is logged by the
/// store and does not undo or fail the mutation.
#[async_trait]
pub trait ModelObserver: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// An AIP was created, updated, moved or gained a representation.
    async fn aip_changed(&self, snapshot: &AipSnapshot) -> Result<(), ObserverError>;

    /// An AIP was deleted. The snapshot is what the store held before.
    async fn aip_deleted(&self, snapshot: &AipSnapshot) -> Result<(), ObserverError>;

    async fn preservation_metadata_recorded(
        &self,
        _pm: &PreservationMetadata,
    ) -> Result<(), ObserverError> {
        Ok(())
    }

    async fn log_entry_added(&self, _entry: &LogEntry) -> Result<(), ObserverError> {
        Ok(())
    }
}
