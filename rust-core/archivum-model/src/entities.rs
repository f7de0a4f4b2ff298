// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Authoritative entity records and the ingest manifests they are built from.

use std::collections::{BTreeMap, BTreeSet};

use archivum_storage::StoragePath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Lifecycle state of an AIP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AipState {
    #[default]
    Active,
    UnderAppraisal,
    Inactive,
    Deleted,
}

impl AipState {
    pub fn as_str(self) -> &'static str {
        match self {
            AipState::Active => "ACTIVE",
            AipState::UnderAppraisal => "UNDER_APPRAISAL",
            AipState::Inactive => "INACTIVE",
            AipState::Deleted => "DELETED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    Read,
    Create,
    Update,
    Delete,
    Grant,
}

/// Permission type to the users and groups holding it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub users: BTreeMap<PermissionType, BTreeSet<String>>,
    #[serde(default)]
    pub groups: BTreeMap<PermissionType, BTreeSet<String>>,
}

impl Permissions {
    pub fn grant_user(mut self, permission: PermissionType, user: impl Into<String>) -> Self {
        self.users.entry(permission).or_default().insert(user.into());
        self
    }

    pub fn grant_group(mut self, permission: PermissionType, group: impl Into<String>) -> Self {
        self.groups.entry(permission).or_default().insert(group.into());
        self
    }

    pub fn users_with(&self, permission: PermissionType) -> impl Iterator<Item = &String> {
        self.users.get(&permission).into_iter().flatten()
    }

    pub fn groups_with(&self, permission: PermissionType) -> impl Iterator<Item = &String> {
        self.groups.get(&permission).into_iter().flatten()
    }
}

/// An archival information package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aip {
    pub id: String,
    pub parent_id: Option<String>,
    pub state: AipState,
    pub permissions: Permissions,
    pub representation_ids: Vec<String>,
    pub created_on: DateTime<Utc>,
    pub updated_on: DateTime<Utc>,
}

/// A reference to one stored content file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: String,
    pub storage_path: StoragePath,
    pub size: u64,
    /// Lowercase hex SHA-256 of the content as ingested.
    pub sha256: String,
}

impl FileRef {
    pub fn digest(content: &[u8]) -> String {
        hex::encode(Sha256::digest(content))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Representation {
    pub id: String,
    pub aip_id: String,
    #[serde(rename = "type")]
    pub representation_type: String,
    pub original: bool,
    pub files: Vec<FileRef>,
}

impl Representation {
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreservationKind {
    Event,
    Agent,
    #[default]
    Object,
}

impl PreservationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PreservationKind::Event => "EVENT",
            PreservationKind::Agent => "AGENT",
            PreservationKind::Object => "OBJECT",
        }
    }
}

/// A preservation metadata record. The content lives at `storage_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreservationMetadata {
    pub id: String,
    pub aip_id: String,
    pub representation_id: Option<String>,
    pub storage_path: StoragePath,
    pub kind: PreservationKind,
}

// Identity is (id, aip, representation, path); kind is an attribute.
impl PartialEq for PreservationMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.aip_id == other.aip_id
            && self.representation_id == other.representation_id
            && self.storage_path == other.storage_path
    }
}

impl Eq for PreservationMetadata {}

impl std::hash::Hash for PreservationMetadata {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.aip_id.hash(state);
        self.representation_id.hash(state);
        self.storage_path.hash(state);
    }
}

/// What a caller supplies to record preservation metadata; the store
/// decides where the content goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservationRecord {
    pub id: String,
    pub aip_id: String,
    pub representation_id: Option<String>,
    pub kind: PreservationKind,
}

impl PreservationRecord {
    pub fn event(id: impl Into<String>, aip_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            aip_id: aip_id.into(),
            representation_id: None,
            kind: PreservationKind::Event,
        }
    }

    pub fn for_representation(mut self, representation_id: impl Into<String>) -> Self {
        self.representation_id = Some(representation_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptiveMetadata {
    pub id: String,
    pub aip_id: String,
    pub schema: String,
    pub fields: BTreeMap<String, String>,
}

impl DescriptiveMetadata {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// One entry of the action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub action_component: String,
    pub action_method: String,
    pub related_object_id: Option<String>,
    pub username: String,
    pub datetime: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl LogEntry {
    pub fn new(
        action_component: impl Into<String>,
        action_method: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            action_component: action_component.into(),
            action_method: action_method.into(),
            related_object_id: None,
            username: username.into(),
            datetime: Utc::now(),
            duration_ms: 0,
            parameters: BTreeMap::new(),
        }
    }

    pub fn related_to(mut self, object_id: impl Into<String>) -> Self {
        self.related_object_id = Some(object_id.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

/// Everything the store holds for one AIP, read in one go. Observers and
/// the index projection work from snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct AipSnapshot {
    pub aip: Aip,
    pub descriptive: Vec<DescriptiveMetadata>,
    pub representations: Vec<Representation>,
    pub preservation: Vec<PreservationMetadata>,
}

impl AipSnapshot {
    /// First value of `field` across the descriptive records, in id order.
    pub fn descriptive_field(&self, field: &str) -> Option<&str> {
        self.descriptive.iter().find_map(|dm| dm.field(field))
    }
}

/// `aip.json` in an ingest source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AipManifest {
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub state: AipState,
    #[serde(default)]
    pub permissions: Permissions,
}

/// `representation.json` in an ingest source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepresentationManifest {
    #[serde(rename = "type", default = "default_representation_type")]
    pub representation_type: String,
    #[serde(default = "default_original")]
    pub original: bool,
}

impl Default for RepresentationManifest {
    fn default() -> Self {
        Self {
            representation_type: default_representation_type(),
            original: default_original(),
        }
    }
}

fn default_representation_type() -> String {
    "MIXED".to_string()
}

fn default_original() -> bool {
    true
}

/// `descriptive/{id}.json` in an ingest source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptiveManifest {
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}
