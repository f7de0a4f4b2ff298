// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core storage backend trait for Archivum.
//
// Binaries are addressed by `StoragePath`. Besides point operations the
// trait exposes subtree listing and subtree deletion, which is what the
// model needs to copy ingest content and to cascade deletes.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::path::StoragePath;

/// A pluggable binary store addressed by [`StoragePath`].
///
/// Implementations must be safe to share across threads and tokio tasks.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieve the binary stored at `path`.
    ///
    /// Returns `Ok(None)` if nothing is stored there, rather than an error.
    async fn get(&self, path: &StoragePath) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a binary, overwriting any previous content at `path`.
    async fn put(&self, path: &StoragePath, value: &[u8]) -> Result<(), StorageError>;

    /// Delete the binary at `path`.
    ///
    /// Returns `Ok(true)` if something was removed.
    async fn delete(&self, path: &StoragePath) -> Result<bool, StorageError>;

    async fn exists(&self, path: &StoragePath) -> Result<bool, StorageError>;

    /// Every binary strictly below `path`, in lexicographic order of the
    /// textual path form.
    async fn list_under(&self, path: &StoragePath) -> Result<Vec<StoragePath>, StorageError>;

    /// Delete `path` and every binary below it. Returns the number removed.
    async fn delete_under(&self, path: &StoragePath) -> Result<usize, StorageError>;

    /// Flush any buffered writes to durable storage.
    async fn flush(&self) -> Result<(), StorageError>;

    /// A human-readable name for this backend, used in logging.
    fn name(&self) -> &str;

    /// Approximate total size of stored data in bytes, if known.
    async fn approximate_size(&self) -> Result<Option<u64>, StorageError>;
}

/// Copy the subtree below `from` in `source` to the same relative locations
/// below `to` in `dest`. Returns the destination paths written.
pub async fn copy_tree(
    source: &dyn StorageBackend,
    from: &StoragePath,
    dest: &dyn StorageBackend,
    to: &StoragePath,
) -> Result<Vec<StoragePath>, StorageError> {
    let mut written = Vec::new();
    for path in source.list_under(from).await? {
        let bytes = source
            .get(&path)
            .await?
            .ok_or_else(|| StorageError::NotFound(path.to_string()))?;
        let target = path
            .rebase(from, to)
            .ok_or_else(|| StorageError::CorruptedData(format!("{path} is not below {from}")))?;
        dest.put(&target, &bytes).await?;
        written.push(target);
    }
    Ok(written)
}
