// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Indexed documents and how each is projected from its store record.
//!
//! Projections are pure: the same record always yields the same document,
//! which is what makes a rebuild reproduce the index exactly.

use std::collections::BTreeMap;

use archivum_model::{
    AipSnapshot, AipState, LogEntry, Permissions, PreservationKind, PreservationMetadata,
    Representation,
};
use archivum_storage::StoragePath;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::entity_type::EntityType;
use crate::error::IndexError;

/// A document type stored in the index.
pub trait Indexed: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: EntityType;

    /// The document's key within its collection.
    fn uuid(&self) -> String;
}

/// Key of a document owned by an AIP (`aip_id/child_id`, escaped so ids
/// containing `/` stay unambiguous).
pub fn child_uuid(aip_id: &str, child_id: &str) -> String {
    match StoragePath::from_segments([aip_id, child_id]) {
        Ok(path) => path.to_string(),
        // Only reachable with a blank id, which the store never accepts.
        Err(_) => format!("{aip_id}/{child_id}"),
    }
}

/// Inverse of [`child_uuid`].
pub fn split_child_uuid(uuid: &str) -> Result<(String, String), IndexError> {
    let path = StoragePath::parse(uuid).map_err(|e| IndexError::InvalidId(e.to_string()))?;
    match path.segments() {
        [aip_id, child_id] => Ok((aip_id.clone(), child_id.clone())),
        _ => Err(IndexError::InvalidId(format!(
            "'{uuid}' is not of the form aip_id/child_id"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedAip {
    pub id: String,
    pub parent_id: Option<String>,
    pub state: AipState,
    pub permissions: Permissions,
    pub level: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub date_initial: Option<String>,
    pub date_final: Option<String>,
    pub representation_count: usize,
    pub has_representations: bool,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

impl IndexedAip {
    pub fn project(snapshot: &AipSnapshot) -> Self {
        let field = |name: &str| snapshot.descriptive_field(name).map(str::to_string);
        let aip = &snapshot.aip;
        Self {
            id: aip.id.clone(),
            parent_id: aip.parent_id.clone(),
            state: aip.state,
            permissions: aip.permissions.clone(),
            level: field("level"),
            title: field("title"),
            description: field("description"),
            date_initial: field("date_initial"),
            date_final: field("date_final"),
            representation_count: aip.representation_ids.len(),
            has_representations: !aip.representation_ids.is_empty(),
            created_on: aip.created_on,
            updated_on: aip.updated_on,
        }
    }
}

impl Indexed for IndexedAip {
    const TYPE: EntityType = EntityType::Aip;

    fn uuid(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedRepresentation {
    pub uuid: String,
    pub id: String,
    pub aip_id: String,
    #[serde(rename = "type")]
    pub representation_type: String,
    pub original: bool,
    pub file_count: usize,
    pub total_size: u64,
}

impl IndexedRepresentation {
    pub fn project(representation: &Representation) -> Self {
        Self {
            uuid: child_uuid(&representation.aip_id, &representation.id),
            id: representation.id.clone(),
            aip_id: representation.aip_id.clone(),
            representation_type: representation.representation_type.clone(),
            original: representation.original,
            file_count: representation.files.len(),
            total_size: representation.total_size(),
        }
    }
}

impl Indexed for IndexedRepresentation {
    const TYPE: EntityType = EntityType::Representation;

    fn uuid(&self) -> String {
        self.uuid.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedPreservationMetadata {
    pub uuid: String,
    pub id: String,
    pub aip_id: String,
    pub representation_id: Option<String>,
    pub kind: PreservationKind,
    pub storage_path: String,
}

impl IndexedPreservationMetadata {
    pub fn project(pm: &PreservationMetadata) -> Self {
        Self {
            uuid: child_uuid(&pm.aip_id, &pm.id),
            id: pm.id.clone(),
            aip_id: pm.aip_id.clone(),
            representation_id: pm.representation_id.clone(),
            kind: pm.kind,
            storage_path: pm.storage_path.to_string(),
        }
    }
}

impl Indexed for IndexedPreservationMetadata {
    const TYPE: EntityType = EntityType::PreservationMetadata;

    fn uuid(&self) -> String {
        self.uuid.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedLogEntry {
    pub id: String,
    pub action_component: String,
    pub action_method: String,
    pub related_object_id: Option<String>,
    pub username: String,
    pub datetime: DateTime<Utc>,
    pub duration_ms: u64,
    pub parameters: BTreeMap<String, String>,
}

impl IndexedLogEntry {
    pub fn project(entry: &LogEntry) -> Self {
        Self {
            id: entry.id.clone(),
            action_component: entry.action_component.clone(),
            action_method: entry.action_method.clone(),
            related_object_id: entry.related_object_id.clone(),
            username: entry.username.clone(),
            datetime: entry.datetime,
            duration_ms: entry.duration_ms,
            parameters: entry.parameters.clone(),
        }
    }
}

impl Indexed for IndexedLogEntry {
    const TYPE: EntityType = EntityType::LogEntry;

    fn uuid(&self) -> String {
        self.id.clone()
    }
}
