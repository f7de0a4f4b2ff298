// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::collections::BTreeMap;
use std::sync::Arc;

use archivum_index::EntityType;
use tokio::sync::RwLock;
use tracing::debug;

use crate::builtin::{ConversionPlugin, FixityCheckPlugin, ReindexPlugin};
use crate::error::PluginError;
use crate::plugin::Plugin;

/// Builds a fresh plugin instance.
pub type PluginFactory = Arc<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Wrap a constructor as a [`PluginFactory`].
pub fn factory<P, F>(build: F) -> PluginFactory
where
    P: Plugin + 'static,
    F: Fn() -> P + Send + Sync + 'static,
{
    Arc::new(move || -> Box<dyn Plugin> { Box::new(build()) })
}

/// Plugin factories keyed by plugin id. Every job gets its own instance,
/// so parameter values never leak between jobs.
#[derive(Default)]
pub struct PluginRegistry {
    factories: RwLock<BTreeMap<String, PluginFactory>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in plugins: one reindex plugin per
    /// entity type, the fixity check and format conversion.
    pub async fn with_builtins() -> Self {
        let registry = Self::new();
        for entity_type in EntityType::ALL {
            registry
                .register(factory(move || ReindexPlugin::new(entity_type)))
                .await;
        }
        registry.register(factory(FixityCheckPlugin::new)).await;
        registry.register(factory(ConversionPlugin::new)).await;
        registry
    }

    /// Register a factory under the id of the plugin it builds. A factory
    /// already registered under that id is replaced.
    pub async fn register(&self, factory: PluginFactory) -> String {
        let id = factory().id().to_string();
        debug!(plugin = %id, "Registered plugin");
        self.factories.write().await.insert(id.clone(), factory);
        id
    }

    pub async fn instantiate(&self, id: &str) -> Result<Box<dyn Plugin>, PluginError> {
        let factories = self.factories.read().await;
        let factory = factories
            .get(id)
            .ok_or_else(|| PluginError::UnknownPlugin(id.to_string()))?;
        Ok(factory())
    }

    pub async fn ids(&self) -> Vec<String> {
        self.factories.read().await.keys().cloned().collect()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry").finish_non_exhaustive()
    }
}
