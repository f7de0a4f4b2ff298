// SPDX-License-Identifier: PMPL-1.0-or-later
//! Engine lifecycle, failure isolation, stop/halt and progress.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use archivum_index::EntityType;
use archivum_model::ErrorKind;
use archivum_plugins::{
    Completion, EngineConfig, EngineError, EngineState, ExecutionMonitor, ExecutionRequest,
    ParameterValues, Plugin, PluginEngine, PluginError, PluginParameter, PluginParameterType,
    PluginState, PluginType, RepositoryContext, ResolvedParameters,
};
use async_trait::async_trait;
use prometheus::{Registry, TextEncoder};
use tokio::sync::Mutex;

/// Shared observations of a [`ScriptedPlugin`].
#[derive(Default)]
struct Journal {
    executed: Mutex<Vec<String>>,
    after_all_ran: AtomicBool,
    shutdown_ran: AtomicBool,
}

/// Succeeds on every object except `fail-*` (ValidationFailed) and
/// `panic-*` (panics).
struct ScriptedPlugin {
    journal: Arc<Journal>,
    delay: Duration,
    fail_before_all: bool,
    fail_after_all: bool,
    parameters: ResolvedParameters,
}

impl ScriptedPlugin {
    fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            delay: Duration::ZERO,
            fail_before_all: false,
            fail_after_all: false,
            parameters: ResolvedParameters::default(),
        }
    }
}

#[async_trait]
impl Plugin for ScriptedPlugin {
    fn id(&self) -> &str {
        "scripted"
    }

    fn name(&self) -> &str {
        "Scripted"
    }

    fn version(&self) -> &str {
        "1.0"
    }

    fn plugin_type(&self) -> PluginType {
        PluginType::Misc
    }

    fn object_types(&self) -> Vec<EntityType> {
        vec![EntityType::Aip, EntityType::Representation]
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![PluginParameter::new("verbose", PluginParameterType::Boolean, "").with_default("false")]
    }

    fn set_parameter_values(&mut self, values: &ParameterValues) -> Result<(), PluginError> {
        self.parameters = ResolvedParameters::resolve(&self.parameters(), values)?;
        Ok(())
    }

    async fn before_all_execute(
        &self,
        _ctx: &RepositoryContext,
        _target: EntityType,
    ) -> Result<(), PluginError> {
        if self.fail_before_all {
            return Err(PluginError::failed(ErrorKind::Transient, "index offline"));
        }
        Ok(())
    }

    async fn execute(
        &self,
        _ctx: &RepositoryContext,
        _target: EntityType,
        object_id: &str,
    ) -> Result<(), PluginError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if object_id.starts_with("panic-") {
            panic!("cannot handle {object_id}");
        }
        if object_id.starts_with("fail-") {
            return Err(PluginError::failed(
                ErrorKind::ValidationFailed,
                format!("{object_id} is invalid"),
            ));
        }
        self.journal.executed.lock().await.push(object_id.to_string());
        Ok(())
    }

    async fn after_all_execute(
        &self,
        _ctx: &RepositoryContext,
        _target: EntityType,
    ) -> Result<(), PluginError> {
        self.journal.after_all_ran.store(true, Ordering::SeqCst);
        if self.fail_after_all {
            return Err(PluginError::failed(ErrorKind::Transient, "commit failed"));
        }
        Ok(())
    }

    async fn shutdown(&self) {
        self.journal.shutdown_ran.store(true, Ordering::SeqCst);
    }
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn engine(max_workers: usize) -> PluginEngine {
    PluginEngine::new(EngineConfig {
        max_workers,
        halt_on_validation_error: false,
    })
}

#[tokio::test]
async fn test_one_failure_does_not_stop_the_batch() {
    let repo = common::repo(false).await;
    let journal = Arc::new(Journal::default());
    let mut objects: Vec<String> = (0..9).map(|i| format!("obj-{i}")).collect();
    objects.insert(4, "fail-4".into());

    let outcome = engine(3)
        .run(
            &repo.ctx,
            Box::new(ScriptedPlugin::new(journal.clone())),
            ExecutionRequest::new("aip", objects),
            ExecutionMonitor::detached(),
        )
        .await
        .unwrap();

    let report = outcome.report;
    assert_eq!(outcome.completion, Completion::Completed);
    assert_eq!((report.total, report.success, report.failure), (10, 9, 1));
    assert_eq!(report.state, PluginState::PartialSuccess);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].id, "fail-4");
    assert_eq!(report.failures[0].kind, ErrorKind::ValidationFailed);
    assert_eq!(journal.executed.lock().await.len(), 9);
    assert!(journal.after_all_ran.load(Ordering::SeqCst));
    assert!(journal.shutdown_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_panic_is_counted_as_failure() {
    let repo = common::repo(false).await;
    let journal = Arc::new(Journal::default());

    let outcome = engine(2)
        .run(
            &repo.ctx,
            Box::new(ScriptedPlugin::new(journal.clone())),
            ExecutionRequest::new("aip", ids(&["a", "panic-b", "c"])),
            ExecutionMonitor::detached(),
        )
        .await
        .unwrap();

    let report = outcome.report;
    assert_eq!((report.success, report.failure), (2, 1));
    assert_eq!(report.failures[0].id, "panic-b");
    assert!(report.failures[0].message.contains("plugin panicked"));
    assert!(report.failures[0].message.contains("cannot handle panic-b"));
}

#[tokio::test]
async fn test_all_failed_and_empty_batches() {
    let repo = common::repo(false).await;

    let failed = engine(4)
        .run(
            &repo.ctx,
            Box::new(ScriptedPlugin::new(Arc::default())),
            ExecutionRequest::new("aip", ids(&["fail-1", "fail-2"])),
            ExecutionMonitor::detached(),
        )
        .await
        .unwrap();
    assert_eq!(failed.report.state, PluginState::Failure);

    let empty = engine(4)
        .run(
            &repo.ctx,
            Box::new(ScriptedPlugin::new(Arc::default())),
            ExecutionRequest::new("aip", Vec::new()),
            ExecutionMonitor::detached(),
        )
        .await
        .unwrap();
    assert_eq!(empty.report.state, PluginState::Success);
    assert_eq!(empty.report.total, 0);
}

#[tokio::test]
async fn test_setup_failure_processes_nothing() {
    let repo = common::repo(false).await;
    let journal = Arc::new(Journal::default());
    let mut plugin = ScriptedPlugin::new(journal.clone());
    plugin.fail_before_all = true;
    let (monitor, progress, _stop) = ExecutionMonitor::new();

    let err = engine(2)
        .run(
            &repo.ctx,
            Box::new(plugin),
            ExecutionRequest::new("aip", ids(&["a", "b"])),
            monitor,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Setup(_)));
    assert_eq!(err.to_string(), "setup failed: index offline");
    assert!(journal.executed.lock().await.is_empty());
    assert!(!journal.after_all_ran.load(Ordering::SeqCst));
    assert!(journal.shutdown_ran.load(Ordering::SeqCst));
    assert_eq!(progress.borrow().phase, EngineState::Failed);
}

#[tokio::test]
async fn test_after_all_failure_is_a_maintenance_error() {
    let repo = common::repo(false).await;
    let mut plugin = ScriptedPlugin::new(Arc::default());
    plugin.fail_after_all = true;

    let outcome = engine(2)
        .run(
            &repo.ctx,
            Box::new(plugin),
            ExecutionRequest::new("aip", ids(&["a", "b"])),
            ExecutionMonitor::detached(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.completion, Completion::Completed);
    assert_eq!(outcome.report.state, PluginState::Success);
    assert_eq!(outcome.report.success, 2);
    assert_eq!(outcome.report.maintenance_error.as_deref(), Some("commit failed"));
}

#[tokio::test]
async fn test_rejected_before_start() {
    let repo = common::repo(false).await;

    let mut params = ParameterValues::new();
    params.insert("verbose".into(), "maybe".into());
    let request = ExecutionRequest {
        target: "aip".into(),
        parameters: params,
        objects: ids(&["a"]),
    };
    let err = engine(1)
        .run(&repo.ctx, Box::new(ScriptedPlugin::new(Arc::default())), request, ExecutionMonitor::detached())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidParameters(_)));

    for target in ["widget", "log_entry"] {
        let err = engine(1)
            .run(
                &repo.ctx,
                Box::new(ScriptedPlugin::new(Arc::default())),
                ExecutionRequest::new(target, ids(&["a"])),
                ExecutionMonitor::detached(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedType(_)), "{target}");
    }
}

#[tokio::test]
async fn test_stop_before_start_runs_nothing() {
    let repo = common::repo(false).await;
    let journal = Arc::new(Journal::default());
    let (monitor, _progress, stop) = ExecutionMonitor::new();
    stop.send(true).unwrap();

    let outcome = engine(2)
        .run(
            &repo.ctx,
            Box::new(ScriptedPlugin::new(journal.clone())),
            ExecutionRequest::new("aip", ids(&["a", "b", "c"])),
            monitor,
        )
        .await
        .unwrap();

    assert_eq!(outcome.completion, Completion::Stopped);
    assert_eq!(outcome.report.unprocessed(), 3);
    assert!(journal.executed.lock().await.is_empty());
    // Staged work still gets flushed.
    assert!(journal.after_all_ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_stop_mid_batch_lets_in_flight_objects_finish() {
    let repo = common::repo(false).await;
    let journal = Arc::new(Journal::default());
    let mut plugin = ScriptedPlugin::new(journal.clone());
    plugin.delay = Duration::from_millis(20);
    let (monitor, mut progress, stop) = ExecutionMonitor::new();
    let objects: Vec<String> = (0..20).map(|i| format!("obj-{i}")).collect();

    let ctx = repo.ctx.clone();
    let run = tokio::spawn(async move {
        engine(1)
            .run(&ctx, Box::new(plugin), ExecutionRequest::new("aip", objects), monitor)
            .await
    });

    progress.wait_for(|p| p.processed() >= 1).await.unwrap();
    stop.send(true).unwrap();
    let outcome = run.await.unwrap().unwrap();

    assert_eq!(outcome.completion, Completion::Stopped);
    let report = outcome.report;
    assert!(report.success >= 1);
    assert!(report.unprocessed() > 0);
    assert_eq!(report.success as usize, journal.executed.lock().await.len());
    assert!(report.details.starts_with("Stopped on request"));
}

#[tokio::test]
async fn test_halt_on_validation_error() {
    let repo = common::repo(false).await;
    let objects = ids(&["a", "fail-b", "c", "d"]);

    let halting = PluginEngine::new(EngineConfig {
        max_workers: 1,
        halt_on_validation_error: true,
    });
    let outcome = halting
        .run(
            &repo.ctx,
            Box::new(ScriptedPlugin::new(Arc::default())),
            ExecutionRequest::new("aip", objects.clone()),
            ExecutionMonitor::detached(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.completion, Completion::Halted);
    assert_eq!((outcome.report.success, outcome.report.failure), (1, 1));
    assert_eq!(outcome.report.unprocessed(), 2);

    let outcome = engine(1)
        .run(
            &repo.ctx,
            Box::new(ScriptedPlugin::new(Arc::default())),
            ExecutionRequest::new("aip", objects),
            ExecutionMonitor::detached(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.completion, Completion::Completed);
    assert_eq!((outcome.report.success, outcome.report.failure), (3, 1));
}

#[tokio::test]
async fn test_progress_never_exceeds_total() {
    let repo = common::repo(false).await;
    let (monitor, mut progress, _stop) = ExecutionMonitor::new();
    let objects: Vec<String> = (0..50)
        .map(|i| if i % 7 == 0 { format!("fail-{i}") } else { format!("obj-{i}") })
        .collect();

    let watcher = tokio::spawn(async move {
        let mut last = 0;
        while progress.changed().await.is_ok() {
            let snapshot = *progress.borrow_and_update();
            assert!(snapshot.processed() <= snapshot.total);
            assert!(snapshot.processed() >= last, "counters went backwards");
            last = snapshot.processed();
        }
        last
    });

    let outcome = engine(8)
        .run(
            &repo.ctx,
            Box::new(ScriptedPlugin::new(Arc::default())),
            ExecutionRequest::new("aip", objects),
            monitor,
        )
        .await
        .unwrap();

    // The monitor is dropped with the run, which ends the watcher.
    assert_eq!(watcher.await.unwrap(), 50);
    assert_eq!(outcome.report.success + outcome.report.failure, 50);
    assert_eq!(outcome.report.failure, 8);
}

#[tokio::test]
async fn test_metrics_count_objects_and_jobs() {
    let repo = common::repo(false).await;
    let registry = Registry::new();
    let engine = engine(2).with_prometheus(&registry).unwrap();

    engine
        .run(
            &repo.ctx,
            Box::new(ScriptedPlugin::new(Arc::default())),
            ExecutionRequest::new("aip", ids(&["a", "fail-b", "c"])),
            ExecutionMonitor::detached(),
        )
        .await
        .unwrap();

    let text = TextEncoder::new().encode_to_string(&registry.gather()).unwrap();
    let value = |name: &str| -> f64 {
        text.lines()
            .find_map(|line| line.strip_prefix(name)?.trim().parse().ok())
            .unwrap()
    };
    assert_eq!(value("archivum_engine_objects_succeeded_total"), 2.0);
    assert_eq!(value("archivum_engine_objects_failed_total"), 1.0);
    assert_eq!(value("archivum_engine_jobs_total"), 1.0);
}
