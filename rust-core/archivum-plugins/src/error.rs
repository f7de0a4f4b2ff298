// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use archivum_index::IndexError;
use archivum_model::{storage_kind, ErrorKind, ModelError};
use archivum_storage::StorageError;
use thiserror::Error;

/// Errors raised by plugins, per object or during setup.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("Unsupported object type: {0}")]
    UnsupportedType(String),

    /// A plugin-level failure with an explicit classification.
    #[error("{message}")]
    Failed { kind: ErrorKind, message: String },

    #[error("Tool error: {0}")]
    Tool(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginError {
    pub fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        PluginError::Failed {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginError::InvalidParameter(_)
            | PluginError::UnknownPlugin(_)
            | PluginError::UnsupportedType(_) => ErrorKind::InvalidParameter,
            PluginError::Failed { kind, .. } => *kind,
            PluginError::Tool(_) | PluginError::Io(_) => ErrorKind::Transient,
            PluginError::Model(err) => err.kind(),
            PluginError::Index(err) => err.kind(),
            PluginError::Storage(err) => storage_kind(err),
        }
    }
}

/// Errors that end an execution before any object is processed.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(#[source] PluginError),

    #[error("unsupported target type: {0}")]
    UnsupportedType(String),

    #[error("init failed: {0}")]
    Init(#[source] PluginError),

    #[error("setup failed: {0}")]
    Setup(#[source] PluginError),

    #[error("metrics registration failed: {0}")]
    Metrics(String),
}
