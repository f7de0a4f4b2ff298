// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use archivum_index::IndexError;
use archivum_model::{storage_kind, ErrorKind, ModelError};
use archivum_plugins::{EngineError, PluginError};
use archivum_storage::StorageError;
use thiserror::Error;

use crate::job::JobState;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    AlreadyExists(String),

    #[error("Job {id} is {state:?}")]
    InvalidState { id: String, state: JobState },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::NotFound(_) => ErrorKind::NotFound,
            JobError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            JobError::InvalidState { .. } => ErrorKind::ValidationFailed,
            JobError::Config(_) => ErrorKind::InvalidParameter,
            JobError::Plugin(err) => err.kind(),
            JobError::Engine(EngineError::Setup(err) | EngineError::Init(err)) => err.kind(),
            JobError::Engine(EngineError::Metrics(_)) => ErrorKind::Transient,
            JobError::Engine(_) => ErrorKind::InvalidParameter,
            JobError::Index(err) => err.kind(),
            JobError::Model(err) => err.kind(),
            JobError::Storage(err) => storage_kind(err),
        }
    }
}
