// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::sync::Arc;

use archivum_model::{AipSnapshot, LogEntry, ModelObserver, ObserverError, PreservationMetadata};
use async_trait::async_trait;

use crate::documents::{IndexedLogEntry, IndexedPreservationMetadata};
use crate::service::IndexService;

/// Keeps the index in step with store mutations.
pub struct IndexModelObserver {
    index: Arc<IndexService>,
}

impl IndexModelObserver {
    pub fn new(index: Arc<IndexService>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl ModelObserver for IndexModelObserver {
    fn name(&self) -> &str {
        "index"
    }

    async fn aip_changed(&self, snapshot: &AipSnapshot) -> Result<(), ObserverError> {
        self.index.index_aip(snapshot).await?;
        Ok(())
    }

    async fn aip_deleted(&self, snapshot: &AipSnapshot) -> Result<(), ObserverError> {
        self.index.remove_aip(snapshot).await?;
        Ok(())
    }

    async fn preservation_metadata_recorded(
        &self,
        pm: &PreservationMetadata,
    ) -> Result<(), ObserverError> {
        self.index
            .upsert(&IndexedPreservationMetadata::project(pm))
            .await?;
        Ok(())
    }

    async fn log_entry_added(&self, entry: &LogEntry) -> Result<(), ObserverError> {
        self.index.upsert(&IndexedLogEntry::project(entry)).await?;
        Ok(())
    }
}
