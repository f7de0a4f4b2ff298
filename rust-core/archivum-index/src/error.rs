// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use archivum_model::{storage_kind, ErrorKind, ModelError};
use archivum_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Not found in index: {0}")]
    NotFound(String),

    #[error("Unsupported entity type: {0}")]
    UnsupportedType(String),

    #[error("Cyclic ancestry: {id} reaches {repeated} twice")]
    CyclicAncestry { id: String, repeated: String },

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid document id: {0}")]
    InvalidId(String),

    #[error("Index storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

impl IndexError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IndexError::NotFound(_) => ErrorKind::NotFound,
            IndexError::UnsupportedType(_)
            | IndexError::InvalidFilter(_)
            | IndexError::InvalidId(_) => ErrorKind::InvalidParameter,
            IndexError::CyclicAncestry { .. } => ErrorKind::ValidationFailed,
            IndexError::Storage(err) => storage_kind(err),
            IndexError::Model(err) => err.kind(),
        }
    }
}
