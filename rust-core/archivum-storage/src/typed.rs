// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed record storage on top of any `StorageBackend`.
//
// Records are JSON documents stored one per path below a root path. The
// model keeps its manifests this way, the index keeps one collection per
// root, and jobs are persisted under their own root.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::path::StoragePath;

/// Serialize a record to its stored JSON form.
pub fn encode<T: Serialize>(path: &StoragePath, value: &T) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(value).map_err(|err| {
        StorageError::SerializationError(format!("failed to serialize value for '{path}': {err}"))
    })
}

/// Deserialize a record read from `path`.
pub fn decode<T: DeserializeOwned>(path: &StoragePath, bytes: &[u8]) -> Result<T, StorageError> {
    serde_json::from_slice(bytes).map_err(|err| {
        StorageError::SerializationError(format!("failed to deserialize value for '{path}': {err}"))
    })
}

/// Read and decode a JSON record, `Ok(None)` if absent.
pub async fn get_json<T: DeserializeOwned>(
    backend: &dyn StorageBackend,
    path: &StoragePath,
) -> Result<Option<T>, StorageError> {
    match backend.get(path).await? {
        Some(bytes) => Ok(Some(decode(path, &bytes)?)),
        None => Ok(None),
    }
}

/// Encode and write a JSON record.
pub async fn put_json<T: Serialize>(
    backend: &dyn StorageBackend,
    path: &StoragePath,
    value: &T,
) -> Result<(), StorageError> {
    let bytes = encode(path, value)?;
    backend.put(path, &bytes).await
}

/// A keyed collection of JSON records stored directly below `root`.
///
/// Each record lives at `root/{key}`; keys may contain any character since
/// path segments are escaped.
#[derive(Clone)]
pub struct TypedStore {
    backend: Arc<dyn StorageBackend>,
    root: StoragePath,
}

impl TypedStore {
    pub fn new(backend: Arc<dyn StorageBackend>, root: StoragePath) -> Self {
        Self { backend, root }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn root(&self) -> &StoragePath {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<StoragePath, StorageError> {
        Ok(self.root.child(key)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let path = self.path_for(key)?;
        get_json(self.backend.as_ref(), &path).await
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        put_json(self.backend.as_ref(), &path, value).await
    }

    /// Returns `Ok(true)` if the record existed.
    pub async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        self.backend.delete(&path).await
    }

    /// Keys of every record in the collection, in stored order.
    pub async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let depth = self.root.len() + 1;
        Ok(self
            .backend
            .list_under(&self.root)
            .await?
            .into_iter()
            .filter(|path| path.len() == depth)
            .map(|path| path.name().to_string())
            .collect())
    }

    /// Every record in the collection as (key, value) pairs.
    pub async fn entries<T: DeserializeOwned>(&self) -> Result<Vec<(String, T)>, StorageError> {
        let mut results = Vec::new();
        for key in self.keys().await? {
            // A record may vanish between listing and reading.
            if let Some(value) = self.get(&key).await? {
                results.push((key, value));
            }
        }
        Ok(results)
    }

    /// Remove every record. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        self.backend.delete_under(&self.root).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Record {
        name: String,
        score: u32,
    }

    fn store(root: &str) -> (InMemoryBackend, TypedStore) {
        let backend = InMemoryBackend::new();
        let typed = TypedStore::new(
            Arc::new(backend.clone()),
            StoragePath::parse(root).unwrap(),
        );
        (backend, typed)
    }

    #[tokio::test]
    async fn test_typed_round_trip() {
        let (_, store) = store("jobs");
        let record = Record { name: "reindex".into(), score: 3 };

        store.put("j1", &record).await.unwrap();
        assert_eq!(store.get::<Record>("j1").await.unwrap(), Some(record));
        assert!(store.get::<Record>("missing").await.unwrap().is_none());

        assert!(store.delete("j1").await.unwrap());
        assert!(!store.delete("j1").await.unwrap());
    }

    #[tokio::test]
    async fn test_keys_skip_nested_binaries() {
        let (backend, store) = store("index/aip");
        store.put("a", &1u32).await.unwrap();
        store.put("b/with/slash", &2u32).await.unwrap();
        backend
            .put(&StoragePath::parse("index/aip/a/nested").unwrap(), b"x")
            .await
            .unwrap();

        let keys = store.keys().await.unwrap();
        assert_eq!(keys, vec!["a".to_string(), "b/with/slash".to_string()]);

        let entries: Vec<(String, u32)> = store.entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1], ("b/with/slash".to_string(), 2));
    }

    #[tokio::test]
    async fn test_roots_are_isolated() {
        let backend = Arc::new(InMemoryBackend::new());
        let aips = TypedStore::new(backend.clone(), StoragePath::parse("index/aip").unwrap());
        let reps = TypedStore::new(
            backend.clone(),
            StoragePath::parse("index/representation").unwrap(),
        );

        aips.put("x", &"aip".to_string()).await.unwrap();
        reps.put("x", &"rep".to_string()).await.unwrap();

        assert_eq!(aips.clear().await.unwrap(), 1);
        assert!(aips.keys().await.unwrap().is_empty());
        assert_eq!(reps.get::<String>("x").await.unwrap().unwrap(), "rep");
    }

    #[tokio::test]
    async fn test_deserialization_error() {
        let (backend, store) = store("bad");
        backend
            .put(&StoragePath::parse("bad/broken").unwrap(), b"not-json")
            .await
            .unwrap();

        match store.get::<Record>("broken").await.unwrap_err() {
            StorageError::SerializationError(msg) => {
                assert!(msg.contains("failed to deserialize"));
            }
            other => panic!("expected SerializationError, got: {:?}", other),
        }
    }
}
