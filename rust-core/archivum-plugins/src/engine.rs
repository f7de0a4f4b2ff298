// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! The plugin execution engine.
//!
//! One call to [`PluginEngine::run`] drives a plugin through its lifecycle
//! over a batch of object ids:
//!
//! ```text
//! Initialized -> BeforeAll -> Executing -> AfterAll -> Shutdown
//!      \____________\______________________________-> Failed
//! ```
//!
//! The execute phase fans out over a [`JoinSet`] holding at most
//! `max_workers` tasks. A failing or panicking object is counted and the
//! batch goes on. Progress is published on a `watch` channel after every
//! object; a `watch` stop flag prevents new objects from starting.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use archivum_index::EntityType;
use archivum_model::ErrorKind;
use chrono::Utc;
use futures::FutureExt;
use prometheus::{Counter, Registry};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::context::RepositoryContext;
use crate::error::{EngineError, PluginError};
use crate::parameter::ParameterValues;
use crate::plugin::Plugin;
use crate::report::{EngineState, JobPluginInfo, ObjectFailure, PluginState, Progress, Report};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Objects processed concurrently within one execution.
    pub max_workers: usize,
    /// Stop starting new objects once one fails with a halting kind
    /// (`ValidationFailed` or `Unauthorized`).
    pub halt_on_validation_error: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            halt_on_validation_error: false,
        }
    }
}

/// What to run a plugin over.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Entity type key, e.g. `"aip"`.
    pub target: String,
    pub parameters: ParameterValues,
    pub objects: Vec<String>,
}

impl ExecutionRequest {
    pub fn new(target: impl Into<String>, objects: Vec<String>) -> Self {
        Self {
            target: target.into(),
            parameters: ParameterValues::new(),
            objects,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Channels connecting a running execution to its owner.
#[derive(Debug)]
pub struct ExecutionMonitor {
    progress: watch::Sender<Progress>,
    stop: watch::Receiver<bool>,
}

impl ExecutionMonitor {
    /// A monitor plus the progress receiver and the stop sender.
    pub fn new() -> (Self, watch::Receiver<Progress>, watch::Sender<bool>) {
        let (progress_tx, progress_rx) = watch::channel(Progress::default());
        let (stop_tx, stop_rx) = watch::channel(false);
        (
            Self {
                progress: progress_tx,
                stop: stop_rx,
            },
            progress_rx,
            stop_tx,
        )
    }

    /// A monitor nobody observes and nobody can stop.
    pub fn detached() -> Self {
        Self::new().0
    }

    fn publish(&self, progress: Progress) {
        self.progress.send_replace(progress);
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }
}

/// How the execute phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    /// Every object was processed.
    Completed,
    /// A stop was requested; remaining objects were not started.
    Stopped,
    /// A halting failure stopped the batch.
    Halted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOutcome {
    pub report: Report,
    pub completion: Completion,
}

struct EngineMetrics {
    objects_succeeded: Counter,
    objects_failed: Counter,
    jobs: Counter,
}

pub struct PluginEngine {
    config: EngineConfig,
    metrics: Option<EngineMetrics>,
}

impl PluginEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            metrics: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register the engine's counters with a Prometheus registry.
    pub fn with_prometheus(mut self, registry: &Registry) -> Result<Self, EngineError> {
        let counter = |name: &str, help: &str| -> Result<Counter, EngineError> {
            let counter =
                Counter::new(name, help).map_err(|e| EngineError::Metrics(e.to_string()))?;
            registry
                .register(Box::new(counter.clone()))
                .map_err(|e| EngineError::Metrics(e.to_string()))?;
            Ok(counter)
        };

        self.metrics = Some(EngineMetrics {
            objects_succeeded: counter(
                "archivum_engine_objects_succeeded_total",
                "Objects processed with success",
            )?,
            objects_failed: counter(
                "archivum_engine_objects_failed_total",
                "Objects processed with failure",
            )?,
            jobs: counter("archivum_engine_jobs_total", "Plugin executions run")?,
        });
        Ok(self)
    }

    /// Run `plugin` over `request.objects`.
    ///
    /// Returns an error only when the run fails before any object is
    /// processed. Per-object failures, panics and after-all errors end up
    /// in the [`Report`].
    #[instrument(skip_all, fields(plugin = %plugin.id(), target = %request.target))]
    pub async fn run(
        &self,
        ctx: &RepositoryContext,
        mut plugin: Box<dyn Plugin>,
        request: ExecutionRequest,
        monitor: ExecutionMonitor,
    ) -> Result<EngineOutcome, EngineError> {
        let started_at = Utc::now();
        let info = Arc::new(JobPluginInfo::new(request.objects.len() as u64));
        monitor.publish(info.snapshot(EngineState::Initialized));

        let prepared = prepare(plugin.as_mut(), &request).await;
        let target = match prepared {
            Ok(target) => target,
            Err(err) => {
                warn!(error = %err, "Plugin could not be prepared");
                monitor.publish(info.snapshot(EngineState::Failed));
                return Err(err);
            }
        };
        let plugin: Arc<dyn Plugin> = Arc::from(plugin);

        debug!(state = ?EngineState::BeforeAll, "Engine state");
        monitor.publish(info.snapshot(EngineState::BeforeAll));
        if let Err(err) = plugin.before_all_execute(ctx, target).await {
            warn!(error = %err, "Before-all failed, no objects processed");
            plugin.shutdown().await;
            monitor.publish(info.snapshot(EngineState::Failed));
            return Err(EngineError::Setup(err));
        }

        info!(objects = info.total(), workers = self.config.max_workers, "Executing plugin");
        monitor.publish(info.snapshot(EngineState::Executing));
        let completion = self
            .execute_all(ctx, &plugin, target, request.objects, &info, &monitor)
            .await;

        debug!(state = ?EngineState::AfterAll, ?completion, "Engine state");
        monitor.publish(info.snapshot(EngineState::AfterAll));
        let maintenance_error = match plugin.after_all_execute(ctx, target).await {
            Ok(()) => None,
            Err(err) => {
                warn!(error = %err, "After-all failed");
                Some(err.to_string())
            }
        };

        plugin.shutdown().await;
        let progress = info.snapshot(EngineState::Shutdown);
        monitor.publish(progress);
        if let Some(metrics) = &self.metrics {
            metrics.jobs.inc();
        }

        let mut failures = info.failures().await;
        failures.sort_by(|a, b| a.id.cmp(&b.id));
        let report = Report {
            plugin_id: plugin.id().to_string(),
            plugin_name: plugin.name().to_string(),
            plugin_version: plugin.version().to_string(),
            target,
            total: progress.total,
            success: progress.success,
            failure: progress.failure,
            state: PluginState::from_counts(progress.success, progress.failure),
            details: details(&progress, completion),
            failures,
            maintenance_error,
            started_at,
            completed_at: Utc::now(),
        };
        info!(
            success = report.success,
            failure = report.failure,
            state = ?report.state,
            ?completion,
            "Plugin execution finished"
        );
        Ok(EngineOutcome { report, completion })
    }

    async fn execute_all(
        &self,
        ctx: &RepositoryContext,
        plugin: &Arc<dyn Plugin>,
        target: EntityType,
        objects: Vec<String>,
        info: &Arc<JobPluginInfo>,
        monitor: &ExecutionMonitor,
    ) -> Completion {
        let max_workers = self.config.max_workers.max(1);
        let mut pending = objects.into_iter().peekable();
        let mut workers = JoinSet::new();
        let mut completion = Completion::Completed;

        loop {
            while completion == Completion::Completed && workers.len() < max_workers {
                if pending.peek().is_none() {
                    break;
                }
                if monitor.stop_requested() {
                    info!(in_flight = workers.len(), "Stop requested, no new objects start");
                    completion = Completion::Stopped;
                    break;
                }
                let Some(id) = pending.next() else { break };
                let plugin = Arc::clone(plugin);
                let ctx = ctx.clone();
                workers.spawn(async move {
                    let outcome = AssertUnwindSafe(plugin.execute(&ctx, target, &id))
                        .catch_unwind()
                        .await;
                    (id, outcome)
                });
            }

            let Some(joined) = workers.join_next().await else {
                break;
            };
            let failure = match joined {
                Ok((_, Ok(Ok(())))) => None,
                Ok((id, Ok(Err(err)))) => Some(object_failure(id, &err)),
                Ok((id, Err(payload))) => Some(ObjectFailure {
                    id,
                    kind: ErrorKind::Transient,
                    message: format!("plugin panicked: {}", panic_message(payload.as_ref())),
                }),
                // Tasks are never aborted, so only a runtime shutdown lands here.
                Err(err) => Some(ObjectFailure {
                    id: String::new(),
                    kind: ErrorKind::Transient,
                    message: format!("worker task failed: {err}"),
                }),
            };

            match failure {
                None => {
                    info.record_success();
                    if let Some(metrics) = &self.metrics {
                        metrics.objects_succeeded.inc();
                    }
                }
                Some(failure) => {
                    debug!(id = %failure.id, kind = %failure.kind, error = %failure.message, "Object failed");
                    let halting = failure.kind.is_halting();
                    info.record_failure(failure).await;
                    if let Some(metrics) = &self.metrics {
                        metrics.objects_failed.inc();
                    }
                    if halting
                        && self.config.halt_on_validation_error
                        && completion == Completion::Completed
                    {
                        warn!("Halting failure, no new objects start");
                        completion = Completion::Halted;
                    }
                }
            }
            monitor.publish(info.snapshot(EngineState::Executing));
        }

        completion
    }
}

impl std::fmt::Debug for PluginEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginEngine")
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

/// Parameters, target type and init, in that order.
async fn prepare(plugin: &mut dyn Plugin, request: &ExecutionRequest) -> Result<EntityType, EngineError> {
    plugin
        .set_parameter_values(&request.parameters)
        .map_err(EngineError::InvalidParameters)?;

    let target: EntityType = request
        .target
        .parse()
        .map_err(|_| EngineError::UnsupportedType(request.target.clone()))?;
    if !plugin.object_types().contains(&target) {
        return Err(EngineError::UnsupportedType(format!(
            "{} does not accept {target}",
            plugin.id()
        )));
    }

    plugin.init().await.map_err(EngineError::Init)?;
    Ok(target)
}

fn object_failure(id: String, err: &PluginError) -> ObjectFailure {
    ObjectFailure {
        id,
        kind: err.kind(),
        message: err.to_string(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn details(progress: &Progress, completion: Completion) -> String {
    let summary = format!(
        "{} of {} objects processed, {} failed",
        progress.processed(),
        progress.total,
        progress.failure
    );
    match completion {
        Completion::Completed => summary,
        Completion::Stopped => format!("Stopped on request: {summary}"),
        Completion::Halted => format!("Halted on a validation failure: {summary}"),
    }
}
