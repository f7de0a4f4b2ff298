// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Model errors and the shared error-kind taxonomy.

use archivum_storage::{PathError, StorageError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a failure, shared by the model and the index.
///
/// Callers match on the kind to choose between "skip and report" and
/// "stop" policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvalidParameter,
    ValidationFailed,
    Unauthorized,
    Transient,
}

impl ErrorKind {
    /// Kinds that a strict caller treats as a reason to stop a batch.
    pub fn is_halting(self) -> bool {
        matches!(self, ErrorKind::ValidationFailed | ErrorKind::Unauthorized)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Transient => "transient",
        };
        write!(f, "{label}")
    }
}

/// Errors returned by the entity store.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid storage path: {0}")]
    Path(#[from] PathError),
}

impl ModelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::NotFound(_) => ErrorKind::NotFound,
            ModelError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            ModelError::InvalidParameter(_) | ModelError::Path(_) => ErrorKind::InvalidParameter,
            ModelError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            ModelError::Unauthorized(_) => ErrorKind::Unauthorized,
            ModelError::Storage(err) => storage_kind(err),
        }
    }
}

/// Classify a raw storage failure.
pub fn storage_kind(err: &StorageError) -> ErrorKind {
    match err {
        StorageError::NotFound(_) => ErrorKind::NotFound,
        StorageError::InvalidPath(_) => ErrorKind::InvalidParameter,
        StorageError::SerializationError(_) | StorageError::CorruptedData(_) => {
            ErrorKind::ValidationFailed
        }
        StorageError::BackendUnavailable(_) | StorageError::Io(_) => ErrorKind::Transient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(ModelError::NotFound("a".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            ModelError::Storage(StorageError::BackendUnavailable("down".into())).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            ModelError::Storage(StorageError::CorruptedData("x".into())).kind(),
            ErrorKind::ValidationFailed
        );
        assert_eq!(ModelError::Path(PathError::EmptySegment).kind(), ErrorKind::InvalidParameter);
    }

    #[test]
    fn test_halting_kinds() {
        assert!(ErrorKind::ValidationFailed.is_halting());
        assert!(ErrorKind::Unauthorized.is_halting());
        assert!(!ErrorKind::NotFound.is_halting());
        assert!(!ErrorKind::Transient.is_halting());
        assert_eq!(ErrorKind::AlreadyExists.to_string(), "already_exists");
    }
}
