// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::sync::Arc;

use archivum_index::{IndexModelObserver, IndexService};
use archivum_model::ModelService;
use archivum_plugins::{PluginEngine, PluginRegistry, RepositoryContext};
use archivum_storage::{InMemoryBackend, StorageBackend};
use tracing::info;

use crate::config::RepositoryConfig;
use crate::coordinator::JobCoordinator;
use crate::error::JobError;

/// A fully wired repository: store, index kept in step by an observer,
/// plugin registry and job coordinator.
#[derive(Debug)]
pub struct Repository {
    config: RepositoryConfig,
    jobs: Arc<JobCoordinator>,
}

impl Repository {
    pub async fn open(config: RepositoryConfig) -> Result<Self, JobError> {
        let (store, index_backend) = backends(&config)?;
        let model = Arc::new(ModelService::new(store)?);
        let index = Arc::new(IndexService::new(index_backend, config.index.clone())?);
        model
            .register_observer(Arc::new(IndexModelObserver::new(Arc::clone(&index))))
            .await;

        let ctx = RepositoryContext::new(model, index);
        let registry = Arc::new(PluginRegistry::with_builtins().await);
        let engine = PluginEngine::new(config.engine.clone());
        let jobs = Arc::new(JobCoordinator::new(ctx, registry, engine)?);
        info!(
            persistent = config.data_dir.is_some(),
            max_workers = config.engine.max_workers,
            auto_commit = config.index.auto_commit,
            "Repository open"
        );
        Ok(Self { config, jobs })
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn context(&self) -> &RepositoryContext {
        self.jobs.context()
    }

    pub fn jobs(&self) -> &Arc<JobCoordinator> {
        &self.jobs
    }
}

type Backends = (Arc<dyn StorageBackend>, Arc<dyn StorageBackend>);

#[cfg(feature = "persistent")]
fn backends(config: &RepositoryConfig) -> Result<Backends, JobError> {
    use archivum_storage::RedbBackend;

    match &config.data_dir {
        Some(dir) => {
            let store: Arc<dyn StorageBackend> = Arc::new(RedbBackend::open(dir.join("store.redb"))?);
            let index: Arc<dyn StorageBackend> = Arc::new(RedbBackend::open(dir.join("index.redb"))?);
            Ok((store, index))
        }
        None => Ok(in_memory()),
    }
}

#[cfg(not(feature = "persistent"))]
fn backends(config: &RepositoryConfig) -> Result<Backends, JobError> {
    match &config.data_dir {
        Some(dir) => Err(JobError::Config(format!(
            "data directory {} needs the `persistent` feature",
            dir.display()
        ))),
        None => Ok(in_memory()),
    }
}

fn in_memory() -> Backends {
    let store: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
    let index: Arc<dyn StorageBackend> = Arc::new(InMemoryBackend::new());
    (store, index)
}
