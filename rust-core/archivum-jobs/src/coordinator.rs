// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Job lifecycle: selection, plugin instantiation, engine invocation and
//! report persistence.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use archivum_index::{stored_uuids, EntityType};
use archivum_model::LogEntry;
use archivum_plugins::{
    Completion, ExecutionMonitor, ExecutionRequest, PluginEngine, PluginRegistry, Progress,
    RepositoryContext,
};
use archivum_storage::{StoragePath, TypedStore};
use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::error::JobError;
use crate::job::{Job, JobState, SelectedObjects};

/// Container holding the job records.
pub const JOBS_CONTAINER: &str = "jobs";

const SAVE_ATTEMPTS: u32 = 3;
const SAVE_BACKOFF: Duration = Duration::from_millis(50);

/// Channels of a job that is currently running.
struct Running {
    stop: watch::Sender<bool>,
    progress: watch::Receiver<Progress>,
}

/// Creates, runs, stops and reports on jobs.
///
/// Job records are persisted as JSON in the `jobs` container. While a job
/// runs, [`get`](Self::get) and [`list`](Self::list) overlay the live
/// progress on the stored record. A finished job whose record could not be
/// saved is held in memory and saved again on the next read.
pub struct JobCoordinator {
    ctx: RepositoryContext,
    registry: Arc<PluginRegistry>,
    engine: Arc<PluginEngine>,
    store: TypedStore,
    running: Mutex<HashMap<String, Running>>,
    unsaved: Mutex<HashMap<String, Job>>,
}

impl JobCoordinator {
    pub fn new(
        ctx: RepositoryContext,
        registry: Arc<PluginRegistry>,
        engine: PluginEngine,
    ) -> Result<Self, JobError> {
        let root = StoragePath::container_path(JOBS_CONTAINER).map_err(archivum_model::ModelError::from)?;
        Ok(Self {
            store: TypedStore::new(ctx.model.backend().clone(), root),
            ctx,
            registry,
            engine: Arc::new(engine),
            running: Mutex::new(HashMap::new()),
            unsaved: Mutex::new(HashMap::new()),
        })
    }

    pub fn context(&self) -> &RepositoryContext {
        &self.ctx
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Persist a new job in `Created` state. Ids are never reused.
    pub async fn create(&self, mut job: Job) -> Result<Job, JobError> {
        let _running = self.running.lock().await;
        let taken = self.unsaved.lock().await.contains_key(&job.id)
            || self.store.get::<serde_json::Value>(&job.id).await?.is_some();
        if taken {
            return Err(JobError::AlreadyExists(job.id));
        }
        job.state = JobState::Created;
        self.store.put(&job.id, &job).await?;
        info!(job = %job.id, plugin = %job.plugin_id, target = %job.target, "Created job");
        Ok(job)
    }

    /// Run a created job to its end.
    pub async fn run(&self, id: &str) -> Result<Job, JobError> {
        let (job, monitor) = self.start(id).await?;
        Ok(self.execute(job, monitor).await)
    }

    /// Start a created job in the background. The job is `Running` by the
    /// time this returns, so a [`stop`](Self::stop) can reach it.
    pub async fn submit(self: &Arc<Self>, id: &str) -> Result<JoinHandle<Job>, JobError> {
        let (job, monitor) = self.start(id).await?;
        let coordinator = Arc::clone(self);
        Ok(tokio::spawn(async move { coordinator.execute(job, monitor).await }))
    }

    /// Ask a job to stop. A running job finishes its in-flight objects and
    /// ends `Stopped`; a created job is stopped straight away.
    pub async fn stop(&self, id: &str) -> Result<Job, JobError> {
        let signalled = match self.running.lock().await.get(id) {
            Some(running) => {
                running.stop.send_replace(true);
                true
            }
            None => false,
        };
        if signalled {
            info!(job = %id, "Stop requested");
            return self.get(id).await;
        }

        let mut job = self.load(id).await?;
        match job.state {
            JobState::Created => {
                job.state = JobState::Stopped;
                job.ended_at = Some(Utc::now());
                self.store.put(&job.id, &job).await?;
                info!(job = %id, "Stopped before start");
                Ok(job)
            }
            state => Err(JobError::InvalidState {
                id: id.to_string(),
                state,
            }),
        }
    }

    /// The job record, with live progress while it runs.
    pub async fn get(&self, id: &str) -> Result<Job, JobError> {
        self.save_unsaved().await;
        let mut job = self.load(id).await?;
        self.overlay(&mut job).await;
        Ok(job)
    }

    /// All jobs, oldest first.
    pub async fn list(&self) -> Result<Vec<Job>, JobError> {
        self.save_unsaved().await;
        let mut jobs: HashMap<String, Job> = self.store.entries::<Job>().await?.into_iter().collect();
        for job in jobs.values_mut() {
            self.overlay(job).await;
        }
        for (id, job) in self.unsaved.lock().await.iter() {
            jobs.insert(id.clone(), job.clone());
        }
        let mut jobs: Vec<Job> = jobs.into_values().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(jobs)
    }

    /// Subscribe to the progress of a running job.
    pub async fn watch(&self, id: &str) -> Option<watch::Receiver<Progress>> {
        self.running
            .lock()
            .await
            .get(id)
            .map(|running| running.progress.clone())
    }

    /// Save a finished job, retrying with backoff. A job that still cannot
    /// be saved stays in `unsaved`.
    async fn save_finished(&self, job: &Job) {
        let mut unsaved = self.unsaved.lock().await;
        for attempt in 1..=SAVE_ATTEMPTS {
            match self.store.put(&job.id, job).await {
                Ok(()) => {
                    unsaved.remove(&job.id);
                    return;
                }
                Err(err) if attempt < SAVE_ATTEMPTS => {
                    warn!(job = %job.id, attempt, error = %err, "Saving finished job failed, retrying");
                    tokio::time::sleep(SAVE_BACKOFF * attempt).await;
                }
                Err(err) => {
                    error!(job = %job.id, error = %err, "Finished job could not be saved, holding it in memory");
                }
            }
        }
        unsaved.insert(job.id.clone(), job.clone());
    }

    async fn save_unsaved(&self) {
        let mut unsaved = self.unsaved.lock().await;
        let mut saved = Vec::new();
        for (id, job) in unsaved.iter() {
            match self.store.put(id, job).await {
                Ok(()) => saved.push(id.clone()),
                Err(err) => {
                    warn!(job = %id, error = %err, "Finished job still cannot be saved");
                    break;
                }
            }
        }
        for id in saved {
            info!(job = %id, "Saved finished job");
            unsaved.remove(&id);
        }
    }

    async fn load(&self, id: &str) -> Result<Job, JobError> {
        if let Some(job) = self.unsaved.lock().await.get(id) {
            return Ok(job.clone());
        }
        self.store
            .get(id)
            .await?
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    async fn overlay(&self, job: &mut Job) {
        if let Some(running) = self.running.lock().await.get(&job.id) {
            job.progress = *running.progress.borrow();
        }
    }

    /// `Created -> Running`, with the job's channels registered.
    async fn start(&self, id: &str) -> Result<(Job, ExecutionMonitor), JobError> {
        let mut running = self.running.lock().await;
        let mut job = self.load(id).await?;
        if job.state != JobState::Created {
            return Err(JobError::InvalidState {
                id: id.to_string(),
                state: job.state,
            });
        }

        job.state = JobState::Running;
        job.started_at = Some(Utc::now());
        self.store.put(&job.id, &job).await?;

        let (monitor, progress, stop) = ExecutionMonitor::new();
        running.insert(job.id.clone(), Running { stop, progress });
        info!(job = %job.id, "Job running");
        Ok((job, monitor))
    }

    #[instrument(skip_all, fields(job = %job.id, plugin = %job.plugin_id))]
    async fn execute(&self, mut job: Job, monitor: ExecutionMonitor) -> Job {
        let clock = Instant::now();
        match self.process(&mut job, monitor).await {
            Ok(completion) => {
                job.state = match completion {
                    Completion::Completed => JobState::Completed,
                    Completion::Stopped => JobState::Stopped,
                    Completion::Halted => JobState::Failed,
                };
                if completion == Completion::Halted {
                    job.error = Some("halted after a validation failure".to_string());
                }
            }
            Err(err) => {
                warn!(error = %err, "Job failed before processing");
                job.state = JobState::Failed;
                job.error = Some(err.to_string());
            }
        }
        job.ended_at = Some(Utc::now());

        // The running entry goes only once the final record is saved or
        // held in `unsaved`, so readers never see a stale `Running` job.
        let mut running = self.running.lock().await;
        if let Some(entry) = running.get(&job.id) {
            job.progress = *entry.progress.borrow();
        }
        self.save_finished(&job).await;
        running.remove(&job.id);
        drop(running);
        self.log(&job, clock.elapsed().as_millis() as u64).await;
        info!(state = ?job.state, "Job finished");
        job
    }

    async fn process(&self, job: &mut Job, monitor: ExecutionMonitor) -> Result<Completion, JobError> {
        let plugin = self.registry.instantiate(&job.plugin_id).await?;
        job.plugin_type = Some(plugin.plugin_type());
        let objects = self.select(job).await?;

        let request = ExecutionRequest {
            target: job.target.clone(),
            parameters: job.parameters.clone(),
            objects,
        };
        let outcome = self.engine.run(&self.ctx, plugin, request, monitor).await?;
        job.report = Some(outcome.report);
        Ok(outcome.completion)
    }

    /// Resolve the job's selection into a batch of ids.
    async fn select(&self, job: &Job) -> Result<Vec<String>, JobError> {
        let entity_type: EntityType = job.target.parse()?;
        let ids = match &job.selection {
            SelectedObjects::Ids { ids } => {
                let mut seen = HashSet::new();
                ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
            }
            SelectedObjects::Filter { filter } => {
                self.ctx.index.find_uuids(entity_type, filter).await?
            }
            SelectedObjects::All => stored_uuids(&self.ctx.model, entity_type).await?,
        };
        Ok(ids)
    }

    async fn log(&self, job: &Job, duration_ms: u64) {
        let mut entry = LogEntry::new("jobs", "run", "system")
            .related_to(job.id.as_str())
            .with_parameter("plugin", job.plugin_id.as_str())
            .with_parameter("state", format!("{:?}", job.state))
            .with_duration_ms(duration_ms);
        if let Some(report) = &job.report {
            entry = entry
                .with_parameter("success", report.success.to_string())
                .with_parameter("failure", report.failure.to_string());
        }
        if let Err(err) = self.ctx.model.add_log_entry(entry).await {
            warn!(error = %err, "Failed to log job");
        }
    }
}

impl std::fmt::Debug for JobCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobCoordinator")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
