// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::sync::Arc;

use archivum_index::IndexService;
use archivum_model::ModelService;

use crate::tool::{ProcessToolRunner, ToolRunner};

/// Handles a plugin needs to do its work. Built once per repository and
/// passed explicitly to the engine; there is no global instance.
#[derive(Clone)]
pub struct RepositoryContext {
    pub model: Arc<ModelService>,
    pub index: Arc<IndexService>,
    pub tools: Arc<dyn ToolRunner>,
}

impl RepositoryContext {
    pub fn new(model: Arc<ModelService>, index: Arc<IndexService>) -> Self {
        Self {
            model,
            index,
            tools: Arc::new(ProcessToolRunner::new()),
        }
    }

    pub fn with_tools(mut self, tools: Arc<dyn ToolRunner>) -> Self {
        self.tools = tools;
        self
    }
}

impl std::fmt::Debug for RepositoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryContext")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}
