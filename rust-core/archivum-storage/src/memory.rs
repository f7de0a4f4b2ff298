// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory storage backend for Archivum.
//
// Uses a `BTreeMap` keyed by the textual path form, wrapped in a tokio
// `RwLock`. The ordering makes subtree listing a single range scan.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::path::StoragePath;

/// An in-memory storage backend backed by a sorted `BTreeMap`.
///
/// Clones share state. The backend can be switched offline with
/// [`InMemoryBackend::set_available`], after which every operation fails with
/// [`StorageError::BackendUnavailable`].
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    available: Arc<AtomicBool>,
}

impl InMemoryBackend {
    /// Create a new, empty in-memory backend.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Return the number of binaries currently stored.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }

    /// Simulate the backend going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::BackendUnavailable("in-memory backend offline".to_string()))
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, path: &StoragePath) -> Result<Option<Vec<u8>>, StorageError> {
        self.check_available()?;
        let map = self.data.read().await;
        Ok(map.get(&path.to_string()).cloned())
    }

    async fn put(&self, path: &StoragePath, value: &[u8]) -> Result<(), StorageError> {
        self.check_available()?;
        let mut map = self.data.write().await;
        map.insert(path.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, path: &StoragePath) -> Result<bool, StorageError> {
        self.check_available()?;
        let mut map = self.data.write().await;
        Ok(map.remove(&path.to_string()).is_some())
    }

    async fn exists(&self, path: &StoragePath) -> Result<bool, StorageError> {
        self.check_available()?;
        let map = self.data.read().await;
        Ok(map.contains_key(&path.to_string()))
    }

    async fn list_under(&self, path: &StoragePath) -> Result<Vec<StoragePath>, StorageError> {
        self.check_available()?;
        let prefix = path.descendant_prefix();
        let map = self.data.read().await;
        map.range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| StoragePath::parse(k).map_err(StorageError::from))
            .collect()
    }

    async fn delete_under(&self, path: &StoragePath) -> Result<usize, StorageError> {
        self.check_available()?;
        let prefix = path.descendant_prefix();
        let mut map = self.data.write().await;
        let doomed: Vec<String> = map
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect();
        let mut removed = doomed.len();
        for key in doomed {
            map.remove(&key);
        }
        if map.remove(&path.to_string()).is_some() {
            removed += 1;
        }
        Ok(removed)
    }

    async fn flush(&self) -> Result<(), StorageError> {
        self.check_available()
    }

    fn name(&self) -> &str {
        "in-memory"
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StorageError> {
        self.check_available()?;
        let map = self.data.read().await;
        let size: u64 = map.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum();
        Ok(Some(size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> StoragePath {
        StoragePath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_basic_crud() {
        let backend = InMemoryBackend::new();

        assert!(backend.is_empty().await);
        assert_eq!(backend.get(&p("aip/a1")).await.unwrap(), None);
        assert!(!backend.exists(&p("aip/a1")).await.unwrap());

        backend.put(&p("aip/a1"), b"v1").await.unwrap();
        assert_eq!(backend.get(&p("aip/a1")).await.unwrap(), Some(b"v1".to_vec()));
        assert!(backend.exists(&p("aip/a1")).await.unwrap());

        // Overwrite.
        backend.put(&p("aip/a1"), b"v2").await.unwrap();
        assert_eq!(backend.get(&p("aip/a1")).await.unwrap(), Some(b"v2".to_vec()));
        assert_eq!(backend.len().await, 1);

        assert!(backend.delete(&p("aip/a1")).await.unwrap());
        assert!(!backend.delete(&p("aip/a1")).await.unwrap());
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_under_is_strict_and_ordered() {
        let backend = InMemoryBackend::new();
        backend.put(&p("aip/a1/aip.json"), b"{}").await.unwrap();
        backend.put(&p("aip/a1/data/f2"), b"2").await.unwrap();
        backend.put(&p("aip/a1/data/f1"), b"1").await.unwrap();
        backend.put(&p("aip/a10/aip.json"), b"{}").await.unwrap();

        let listed = backend.list_under(&p("aip/a1")).await.unwrap();
        assert_eq!(
            listed,
            vec![p("aip/a1/aip.json"), p("aip/a1/data/f1"), p("aip/a1/data/f2")]
        );

        let data = backend.list_under(&p("aip/a1/data")).await.unwrap();
        assert_eq!(data.len(), 2);
        assert!(backend.list_under(&p("aip/missing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_under_leaves_siblings() {
        let backend = InMemoryBackend::new();
        backend.put(&p("aip/a1/aip.json"), b"{}").await.unwrap();
        backend.put(&p("aip/a1/data/f1"), b"1").await.unwrap();
        backend.put(&p("aip/a10/aip.json"), b"{}").await.unwrap();

        assert_eq!(backend.delete_under(&p("aip/a1")).await.unwrap(), 2);
        assert!(backend.exists(&p("aip/a10/aip.json")).await.unwrap());
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_offline_backend_fails_every_operation() {
        let backend = InMemoryBackend::new();
        backend.put(&p("aip/a1"), b"x").await.unwrap();
        backend.set_available(false);

        let err = backend.get(&p("aip/a1")).await.unwrap_err();
        assert!(err.is_transient());
        assert!(backend.put(&p("aip/a2"), b"y").await.is_err());
        assert!(backend.list_under(&p("aip")).await.is_err());

        backend.set_available(true);
        assert_eq!(backend.get(&p("aip/a1")).await.unwrap(), Some(b"x".to_vec()));
    }

    #[tokio::test]
    async fn test_approximate_size() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.approximate_size().await.unwrap(), Some(0));
        backend.put(&p("a/b"), b"xyz").await.unwrap(); // 3 + 3
        assert_eq!(backend.approximate_size().await.unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let backend = InMemoryBackend::new();
        let clone = backend.clone();
        backend.put(&p("shared/key"), b"data").await.unwrap();
        assert_eq!(clone.get(&p("shared/key")).await.unwrap(), Some(b"data".to_vec()));
        assert_eq!(backend.name(), "in-memory");
    }
}
