// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage error types for the Archivum backend abstraction.

use thiserror::Error;

use crate::path::PathError;

/// Errors that can occur when interacting with a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred in the underlying storage layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested path holds no binary.
    #[error("path not found: {0}")]
    NotFound(String),

    /// Failed to serialize or deserialize a value.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The stored data is corrupted or in an unexpected format.
    #[error("corrupted data: {0}")]
    CorruptedData(String),

    /// The storage backend is not available (e.g., connection lost).
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A key could not be turned into a storage path.
    #[error(transparent)]
    InvalidPath(#[from] PathError),
}

impl StorageError {
    /// True for failures that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::BackendUnavailable(_) | StorageError::Io(_))
    }
}
