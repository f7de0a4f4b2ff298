// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use archivum_index::EntityType;
use async_trait::async_trait;
use tracing::info;

use crate::context::RepositoryContext;
use crate::error::PluginError;
use crate::parameter::{ParameterValues, PluginParameter, PluginParameterType, ResolvedParameters};
use crate::plugin::{Plugin, PluginType};

pub const CLEAR_INDEXES: &str = "clear_indexes";
pub const OPTIMIZE_INDEXES: &str = "optimize_indexes";

/// Recomputes the index documents of one entity type from the store.
#[derive(Debug, Clone)]
pub struct ReindexPlugin {
    entity_type: EntityType,
    id: String,
    name: String,
    parameters: ResolvedParameters,
}

impl ReindexPlugin {
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            id: format!("reindex-{}", entity_type.key()),
            name: format!("Reindex {entity_type}"),
            parameters: ResolvedParameters::default(),
        }
    }

    fn clear_indexes(&self) -> bool {
        self.parameters.get_bool(CLEAR_INDEXES).unwrap_or(false)
    }

    /// Follows `clear_indexes` unless set explicitly.
    fn optimize_indexes(&self) -> bool {
        self.parameters
            .get_bool(OPTIMIZE_INDEXES)
            .unwrap_or_else(|| self.clear_indexes())
    }
}

#[async_trait]
impl Plugin for ReindexPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> &str {
        "Rebuilds index documents from the stored records"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Maintenance
    }

    fn object_types(&self) -> Vec<EntityType> {
        vec![self.entity_type]
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![
            PluginParameter::new(
                CLEAR_INDEXES,
                PluginParameterType::Boolean,
                "Empty the index before reindexing",
            )
            .with_default("false"),
            PluginParameter::new(
                OPTIMIZE_INDEXES,
                PluginParameterType::Boolean,
                "Optimize the index afterwards (defaults to clear_indexes)",
            ),
        ]
    }

    fn set_parameter_values(&mut self, values: &ParameterValues) -> Result<(), PluginError> {
        self.parameters = ResolvedParameters::resolve(&self.parameters(), values)?;
        Ok(())
    }

    async fn before_all_execute(
        &self,
        ctx: &RepositoryContext,
        target: EntityType,
    ) -> Result<(), PluginError> {
        if self.clear_indexes() {
            let removed = ctx.index.clear(target).await?;
            info!(entity_type = %target, removed, "Cleared index before reindex");
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &RepositoryContext,
        target: EntityType,
        object_id: &str,
    ) -> Result<(), PluginError> {
        ctx.index
            .reindex_object(target, object_id, &ctx.model)
            .await
            .map(|_| ())
            .map_err(|err| {
                PluginError::failed(
                    err.kind(),
                    format!("Reindex did not execute successfully: {err}"),
                )
            })
    }

    async fn after_all_execute(
        &self,
        ctx: &RepositoryContext,
        target: EntityType,
    ) -> Result<(), PluginError> {
        ctx.index.commit().await?;
        if self.optimize_indexes() {
            let purged = ctx.index.optimize(target).await?;
            info!(entity_type = %target, purged, "Optimized index");
        }
        Ok(())
    }
}
