// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Archivum Index
//!
//! A denormalized, queryable copy of the entity store. Nothing here is
//! authoritative: every document can be recomputed from the store, and
//! [`IndexService::reindex_all`] does exactly that for a whole collection.
//!
//! Register an [`IndexModelObserver`] on the
//! [`ModelService`](archivum_model::ModelService) to keep the index current
//! as the store changes.

pub mod config;
pub mod documents;
pub mod entity_type;
pub mod error;
pub mod filter;
pub mod observer;
pub mod service;

pub use config::IndexConfig;
pub use documents::{
    child_uuid, split_child_uuid, Indexed, IndexedAip, IndexedLogEntry,
    IndexedPreservationMetadata, IndexedRepresentation,
};
pub use entity_type::EntityType;
pub use error::IndexError;
pub use filter::{Filter, FilterParameter, IndexResult, SortParameter, Sorter, Sublist};
pub use observer::IndexModelObserver;
pub use service::{stored_uuids, IndexService, ReindexFailure, ReindexOutcome, ReindexSummary};
