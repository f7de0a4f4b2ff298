// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Archivum Model
//!
//! The authoritative store. AIPs, their representations and files,
//! preservation metadata, descriptive metadata and the action log all live
//! here; the search index is derived from it and can always be rebuilt
//! from it.
//!
//! Content is ingested from a source [`StorageBackend`](archivum_storage::StorageBackend)
//! laid out as described in [`layout`].

pub mod entities;
pub mod error;
pub mod layout;
pub mod observer;
pub mod service;

pub use entities::{
    Aip, AipManifest, AipSnapshot, AipState, DescriptiveManifest, DescriptiveMetadata, FileRef,
    LogEntry, PermissionType, Permissions, PreservationKind, PreservationMetadata,
    PreservationRecord, Representation, RepresentationManifest,
};
pub use error::{storage_kind, ErrorKind, ModelError};
pub use observer::{ModelObserver, ObserverError};
pub use service::ModelService;
