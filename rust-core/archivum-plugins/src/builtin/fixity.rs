// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use archivum_index::EntityType;
use archivum_model::{ErrorKind, FileRef, PreservationRecord};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::RepositoryContext;
use crate::error::PluginError;
use crate::parameter::{ParameterValues, PluginParameter, ResolvedParameters};
use crate::plugin::{Plugin, PluginType};

/// Recomputes the SHA-256 of every file of an AIP and records the outcome
/// as a preservation event on the AIP.
#[derive(Debug, Clone, Default)]
pub struct FixityCheckPlugin;

impl FixityCheckPlugin {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Serialize)]
struct FixityEvent<'a> {
    event_type: &'static str,
    aip_id: &'a str,
    datetime: String,
    outcome: &'static str,
    checked: usize,
    mismatches: Vec<Mismatch>,
}

#[derive(Debug, Serialize)]
struct Mismatch {
    representation_id: String,
    file_id: String,
    expected: String,
    actual: Option<String>,
}

#[async_trait]
impl Plugin for FixityCheckPlugin {
    fn id(&self) -> &str {
        "fixity-check"
    }

    fn name(&self) -> &str {
        "Fixity check"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "Verifies stored file digests and records a fixity check event"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::AipToAip
    }

    fn object_types(&self) -> Vec<EntityType> {
        vec![EntityType::Aip]
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        Vec::new()
    }

    fn set_parameter_values(&mut self, values: &ParameterValues) -> Result<(), PluginError> {
        ResolvedParameters::resolve(&self.parameters(), values).map(|_| ())
    }

    async fn execute(
        &self,
        ctx: &RepositoryContext,
        _target: EntityType,
        object_id: &str,
    ) -> Result<(), PluginError> {
        let mut checked = 0;
        let mut mismatches = Vec::new();
        for representation in ctx.model.list_representations(object_id).await? {
            for file in &representation.files {
                checked += 1;
                let actual = match ctx.model.retrieve_file_content(file).await {
                    Ok(content) => Some(FileRef::digest(&content)),
                    Err(err) if err.kind() == ErrorKind::NotFound => None,
                    Err(err) => return Err(err.into()),
                };
                if actual.as_deref() != Some(file.sha256.as_str()) {
                    mismatches.push(Mismatch {
                        representation_id: representation.id.clone(),
                        file_id: file.id.clone(),
                        expected: file.sha256.clone(),
                        actual,
                    });
                }
            }
        }

        let event = FixityEvent {
            event_type: "fixity check",
            aip_id: object_id,
            datetime: Utc::now().to_rfc3339(),
            outcome: if mismatches.is_empty() { "success" } else { "failure" },
            checked,
            mismatches,
        };
        let content = serde_json::to_vec_pretty(&event)
            .map_err(|e| PluginError::failed(ErrorKind::ValidationFailed, e.to_string()))?;
        let record = PreservationRecord::event(
            format!("fixity-check-{}", uuid::Uuid::new_v4()),
            object_id,
        );
        ctx.model.record_preservation_metadata(record, &content).await?;

        if event.mismatches.is_empty() {
            debug!(aip = %object_id, files = checked, "Fixity check passed");
            Ok(())
        } else {
            warn!(aip = %object_id, mismatches = event.mismatches.len(), "Fixity check failed");
            Err(PluginError::failed(
                ErrorKind::ValidationFailed,
                format!(
                    "{} of {} files of {object_id} do not match their digest",
                    event.mismatches.len(),
                    checked
                ),
            ))
        }
    }
}
