// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// redb-backed persistent storage backend for Archivum.
//
// - Single redb `Database` file containing one table keyed by the textual
//   storage path.
// - Read transactions for reads, write transactions for put/delete.
// - Subtree listing is a `range()` scan from the descendant prefix.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, TableDefinition};
use tracing::debug;

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::path::StoragePath;

const BINARIES: TableDefinition<&str, &[u8]> = TableDefinition::new("binaries");

/// A persistent storage backend powered by redb.
pub struct RedbBackend {
    db: Arc<Database>,
    path: PathBuf,
}

impl RedbBackend {
    /// Open or create a redb database at the given path.
    ///
    /// Creates parent directories if they don't exist. The table is created
    /// on first write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(StorageError::Io)?;
        }

        let db = Database::create(&path).map_err(|e| {
            StorageError::BackendUnavailable(format!("failed to open redb at {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), "opened redb backend");

        Ok(Self {
            db: Arc::new(db),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn scan(&self, prefix: String) -> Result<Vec<String>, StorageError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || -> Result<Vec<String>, StorageError> {
            let txn = db
                .begin_read()
                .map_err(|e| StorageError::BackendUnavailable(format!("read txn: {e}")))?;
            let table = match txn.open_table(BINARIES) {
                Ok(t) => t,
                // Nothing written yet.
                Err(_) => return Ok(Vec::new()),
            };

            let mut keys = Vec::new();
            let iter = table
                .range(prefix.as_str()..)
                .map_err(|e| StorageError::CorruptedData(format!("range scan: {e}")))?;
            for entry in iter {
                let (k, _) =
                    entry.map_err(|e| StorageError::CorruptedData(format!("scan entry: {e}")))?;
                let key = k.value().to_string();
                if !key.starts_with(&prefix) {
                    break;
                }
                keys.push(key);
            }
            Ok(keys)
        })
        .await
        .map_err(|e| StorageError::BackendUnavailable(format!("task join: {e}")))?
    }

    async fn remove_keys(&self, keys: Vec<String>) -> Result<usize, StorageError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || -> Result<usize, StorageError> {
            let txn = db
                .begin_write()
                .map_err(|e| StorageError::BackendUnavailable(format!("write txn: {e}")))?;
            let mut removed = 0;
            {
                let mut table = txn
                    .open_table(BINARIES)
                    .map_err(|e| StorageError::BackendUnavailable(format!("open table: {e}")))?;
                for key in &keys {
                    if table
                        .remove(key.as_str())
                        .map_err(|e| StorageError::CorruptedData(format!("remove: {e}")))?
                        .is_some()
                    {
                        removed += 1;
                    }
                }
            }
            txn.commit()
                .map_err(|e| StorageError::CorruptedData(format!("commit: {e}")))?;
            Ok(removed)
        })
        .await
        .map_err(|e| StorageError::BackendUnavailable(format!("task join: {e}")))?
    }
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend").field("path", &self.path).finish()
    }
}

#[async_trait]
impl StorageBackend for RedbBackend {
    async fn get(&self, path: &StoragePath) -> Result<Option<Vec<u8>>, StorageError> {
        let db = Arc::clone(&self.db);
        let key = path.to_string();

        tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>, StorageError> {
            let txn = db
                .begin_read()
                .map_err(|e| StorageError::BackendUnavailable(format!("read txn: {e}")))?;
            let table = match txn.open_table(BINARIES) {
                Ok(t) => t,
                Err(_) => return Ok(None),
            };
            match table.get(key.as_str()) {
                Ok(Some(value)) => Ok(Some(value.value().to_vec())),
                Ok(None) => Ok(None),
                Err(e) => Err(StorageError::CorruptedData(format!("get: {e}"))),
            }
        })
        .await
        .map_err(|e| StorageError::BackendUnavailable(format!("task join: {e}")))?
    }

    async fn put(&self, path: &StoragePath, value: &[u8]) -> Result<(), StorageError> {
        let db = Arc::clone(&self.db);
        let key = path.to_string();
        let value = value.to_vec();

        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let txn = db
                .begin_write()
                .map_err(|e| StorageError::BackendUnavailable(format!("write txn: {e}")))?;
            {
                let mut table = txn
                    .open_table(BINARIES)
                    .map_err(|e| StorageError::BackendUnavailable(format!("open table: {e}")))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(|e| StorageError::CorruptedData(format!("insert: {e}")))?;
            }
            txn.commit()
                .map_err(|e| StorageError::CorruptedData(format!("commit: {e}")))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::BackendUnavailable(format!("task join: {e}")))?
    }

    async fn delete(&self, path: &StoragePath) -> Result<bool, StorageError> {
        Ok(self.remove_keys(vec![path.to_string()]).await? > 0)
    }

    async fn exists(&self, path: &StoragePath) -> Result<bool, StorageError> {
        Ok(self.get(path).await?.is_some())
    }

    async fn list_under(&self, path: &StoragePath) -> Result<Vec<StoragePath>, StorageError> {
        self.scan(path.descendant_prefix())
            .await?
            .iter()
            .map(|key| StoragePath::parse(key).map_err(StorageError::from))
            .collect()
    }

    async fn delete_under(&self, path: &StoragePath) -> Result<usize, StorageError> {
        let mut keys = self.scan(path.descendant_prefix()).await?;
        keys.push(path.to_string());
        self.remove_keys(keys).await
    }

    async fn flush(&self) -> Result<(), StorageError> {
        // Each write transaction is durable on commit.
        Ok(())
    }

    fn name(&self) -> &str {
        "redb"
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StorageError> {
        match std::fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(_) => Ok(None),
        }
    }
}
