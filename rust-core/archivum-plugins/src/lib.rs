// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Archivum Plugins
//!
//! Batch processing over repository objects. A [`Plugin`] describes the
//! work; the [`PluginEngine`] runs it over a list of object ids with a
//! bounded worker pool, isolating per-object failures and publishing
//! progress; the [`PluginRegistry`] builds a fresh plugin per job.
//!
//! Built-in plugins live in [`builtin`]: reindexing, fixity checking and
//! format conversion through an external [`ToolRunner`].

pub mod builtin;
pub mod context;
pub mod engine;
pub mod error;
pub mod parameter;
pub mod plugin;
pub mod registry;
pub mod report;
pub mod tool;

pub use builtin::{ConversionPlugin, FixityCheckPlugin, ReindexPlugin};
pub use context::RepositoryContext;
pub use engine::{
    Completion, EngineConfig, EngineOutcome, ExecutionMonitor, ExecutionRequest, PluginEngine,
};
pub use error::{EngineError, PluginError};
pub use parameter::{ParameterValues, PluginParameter, PluginParameterType, ResolvedParameters};
pub use plugin::{Plugin, PluginType};
pub use registry::{factory, PluginFactory, PluginRegistry};
pub use report::{EngineState, JobPluginInfo, ObjectFailure, PluginState, Progress, Report};
pub use tool::{ProcessToolRunner, ToolCommand, ToolOutput, ToolRunner};
