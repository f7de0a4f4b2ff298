// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! The plugin capability set.

use archivum_index::EntityType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::RepositoryContext;
use crate::error::PluginError;
use crate::parameter::{ParameterValues, PluginParameter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginType {
    /// Reads AIPs and writes new content into them.
    AipToAip,
    /// Works on the repository itself (reindexing, housekeeping).
    Maintenance,
    Misc,
}

/// A unit of work run by the [`PluginEngine`](crate::PluginEngine) over a
/// batch of objects of one type.
///
/// The engine calls, in order: [`set_parameter_values`](Plugin::set_parameter_values),
/// [`init`](Plugin::init), [`before_all_execute`](Plugin::before_all_execute)
/// once, [`execute`](Plugin::execute) once per object (concurrently),
/// [`after_all_execute`](Plugin::after_all_execute) once and finally
/// [`shutdown`](Plugin::shutdown).
#[async_trait]
pub trait Plugin: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn plugin_type(&self) -> PluginType;

    /// Object types this plugin accepts as targets.
    fn object_types(&self) -> Vec<EntityType>;

    /// The parameter schema.
    fn parameters(&self) -> Vec<PluginParameter>;

    /// Validate and store parameter values for this run.
    fn set_parameter_values(&mut self, values: &ParameterValues) -> Result<(), PluginError>;

    async fn init(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn before_all_execute(
        &self,
        _ctx: &RepositoryContext,
        _target: EntityType,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    /// Process one object. Errors are counted against that object only.
    async fn execute(
        &self,
        ctx: &RepositoryContext,
        target: EntityType,
        object_id: &str,
    ) -> Result<(), PluginError>;

    async fn after_all_execute(
        &self,
        _ctx: &RepositoryContext,
        _target: EntityType,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    async fn shutdown(&self) {}
}
