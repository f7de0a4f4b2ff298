// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Archivum Jobs
//!
//! Jobs tie the pieces together: a [`Job`] names a plugin, its parameters
//! and a selection of objects; the [`JobCoordinator`] resolves the
//! selection, runs the plugin through the engine and stores the report on
//! the job. [`Repository::open`] wires store, index, registry and
//! coordinator from a [`RepositoryConfig`].

pub mod config;
pub mod coordinator;
pub mod error;
pub mod job;
pub mod repository;

pub use config::RepositoryConfig;
pub use coordinator::{JobCoordinator, JOBS_CONTAINER};
pub use error::JobError;
pub use job::{Job, JobState, SelectedObjects};
pub use repository::Repository;
