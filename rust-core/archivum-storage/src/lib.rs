// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Archivum Storage
//
// Addressing and binary storage for the repository. Everything Archivum
// keeps (AIP manifests, representation files, index documents, job records)
// is stored in a `StorageBackend` at a `StoragePath`.
//
// # Modules
//
// - [`path`] -- `StoragePath`, the hierarchical address of an entity.
// - [`backend`] -- The `StorageBackend` trait and subtree copy helper.
// - [`error`] -- The `StorageError` enum covering all backend failure modes.
// - [`memory`] -- An in-memory `BTreeMap`-based backend.
// - [`typed`] -- JSON record helpers and the `TypedStore` collection.
//
// # Example
//
// ```rust
// use std::sync::Arc;
// use archivum_storage::{InMemoryBackend, StoragePath, TypedStore};
//
// # tokio_test::block_on(async {
// let backend = Arc::new(InMemoryBackend::new());
// let jobs = TypedStore::new(backend, StoragePath::parse("jobs").unwrap());
// jobs.put("j1", &serde_json::json!({"name": "reindex"})).await.unwrap();
//
// let val: serde_json::Value = jobs.get("j1").await.unwrap().unwrap();
// assert_eq!(val["name"], "reindex");
// # });
// ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod path;
pub mod typed;

#[cfg(feature = "redb-backend")]
pub mod redb_backend;

pub use backend::{copy_tree, StorageBackend};
pub use error::StorageError;
pub use memory::InMemoryBackend;
pub use path::{PathError, StoragePath};
pub use typed::TypedStore;

#[cfg(feature = "redb-backend")]
pub use redb_backend::RedbBackend;
