// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! The index service: a derived, rebuildable projection of the store.
//!
//! Each entity type is a collection of JSON documents under
//! `{root}/{type}`. Without auto-commit, writes wait in a staging buffer
//! until `commit`, and readers see the last committed state.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use archivum_model::{AipSnapshot, ErrorKind, ModelError, ModelService};
use archivum_storage::{StorageBackend, StorageError, StoragePath, TypedStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::IndexConfig;
use crate::documents::{
    child_uuid, split_child_uuid, Indexed, IndexedAip, IndexedLogEntry,
    IndexedPreservationMetadata, IndexedRepresentation,
};
use crate::entity_type::EntityType;
use crate::error::IndexError;
use crate::filter::{Filter, IndexResult, Sorter, Sublist};

type Staged = BTreeMap<(EntityType, String), Option<Value>>;

/// What reindexing a single object did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReindexOutcome {
    Indexed,
    /// The object is gone from the store, so its document was dropped.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexFailure {
    pub id: String,
    pub error: String,
}

/// Result of rebuilding one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexSummary {
    pub entity_type: EntityType,
    pub indexed: u64,
    pub removed: u64,
    pub failed: u64,
    pub failures: Vec<ReindexFailure>,
}

pub struct IndexService {
    backend: Arc<dyn StorageBackend>,
    config: IndexConfig,
    root: StoragePath,
    staged: Mutex<Staged>,
}

impl IndexService {
    pub fn new(backend: Arc<dyn StorageBackend>, config: IndexConfig) -> Result<Self, IndexError> {
        let root = StoragePath::parse(&config.root).map_err(StorageError::from)?;
        Ok(Self {
            backend,
            config,
            root,
            staged: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    fn collection(&self, entity_type: EntityType) -> Result<TypedStore, IndexError> {
        let root = self.root.child(entity_type.key()).map_err(StorageError::from)?;
        Ok(TypedStore::new(Arc::clone(&self.backend), root))
    }

    // ---------------------------------------------------------------
    // Writes
    // ---------------------------------------------------------------

    /// Write (or overwrite) a document.
    pub async fn upsert<T: Indexed>(&self, doc: &T) -> Result<(), IndexError> {
        let uuid = doc.uuid();
        let value = serde_json::to_value(doc).map_err(|e| {
            StorageError::SerializationError(format!("index document {uuid}: {e}"))
        })?;
        self.stage(T::TYPE, uuid, Some(value)).await
    }

    /// Remove a document. Removing an absent document is not an error.
    pub async fn delete(&self, entity_type: EntityType, uuid: &str) -> Result<(), IndexError> {
        self.stage(entity_type, uuid.to_string(), None).await
    }

    async fn stage(
        &self,
        entity_type: EntityType,
        uuid: String,
        value: Option<Value>,
    ) -> Result<(), IndexError> {
        if self.config.auto_commit {
            self.apply(entity_type, &uuid, value.as_ref()).await
        } else {
            self.staged.lock().await.insert((entity_type, uuid), value);
            Ok(())
        }
    }

    async fn apply(
        &self,
        entity_type: EntityType,
        uuid: &str,
        value: Option<&Value>,
    ) -> Result<(), IndexError> {
        let collection = self.collection(entity_type)?;
        match value {
            Some(doc) => collection.put(uuid, doc).await?,
            None => {
                collection.delete(uuid).await?;
            }
        }
        Ok(())
    }

    /// Make staged writes visible. Returns how many were applied.
    ///
    /// On failure the unapplied writes stay staged for the next commit.
    pub async fn commit(&self) -> Result<usize, IndexError> {
        let mut staged = self.staged.lock().await;
        let writes = std::mem::take(&mut *staged);
        let total = writes.len();
        let mut writes = writes.into_iter();
        while let Some(((entity_type, uuid), value)) = writes.next() {
            if let Err(err) = self.apply(entity_type, &uuid, value.as_ref()).await {
                staged.insert((entity_type, uuid), value);
                staged.extend(writes);
                warn!(error = %err, remaining = staged.len(), "Index commit interrupted");
                return Err(err);
            }
        }
        if total > 0 {
            debug!(applied = total, "Committed index writes");
        }
        Ok(total)
    }

    /// Number of writes waiting for `commit`.
    pub async fn staged_count(&self) -> usize {
        self.staged.lock().await.len()
    }

    /// Drop every document of a type, staged ones included.
    #[instrument(skip(self))]
    pub async fn clear(&self, entity_type: EntityType) -> Result<usize, IndexError> {
        self.staged.lock().await.retain(|(t, _), _| *t != entity_type);
        let removed = self.collection(entity_type)?.clear().await?;
        info!(entity_type = %entity_type, removed = removed, "Cleared index");
        Ok(removed)
    }

    /// Commit, purge documents that no longer decode as their type, and
    /// flush the backend. Returns how many documents were purged.
    #[instrument(skip(self))]
    pub async fn optimize(&self, entity_type: EntityType) -> Result<usize, IndexError> {
        self.commit().await?;
        let collection = self.collection(entity_type)?;
        let mut purged = 0;
        for uuid in collection.keys().await? {
            let well_formed = match collection.get::<Value>(&uuid).await {
                Ok(Some(doc)) => decodes_as(entity_type, doc),
                Ok(None) => true,
                Err(StorageError::SerializationError(_)) => false,
                Err(err) => return Err(err.into()),
            };
            if !well_formed {
                collection.delete(&uuid).await?;
                purged += 1;
            }
        }
        self.backend.flush().await?;
        info!(entity_type = %entity_type, purged = purged, "Optimized index");
        Ok(purged)
    }

    // ---------------------------------------------------------------
    // Reads
    // ---------------------------------------------------------------

    pub async fn retrieve<T: Indexed>(&self, uuid: &str) -> Result<T, IndexError> {
        self.collection(T::TYPE)?
            .get(uuid)
            .await?
            .ok_or_else(|| IndexError::NotFound(format!("{} {uuid}", T::TYPE)))
    }

    async fn matching(
        &self,
        entity_type: EntityType,
        filter: &Filter,
    ) -> Result<Vec<(String, Value)>, IndexError> {
        filter.validate()?;
        Ok(self
            .collection(entity_type)?
            .entries::<Value>()
            .await?
            .into_iter()
            .filter(|(_, doc)| filter.matches(doc))
            .collect())
    }

    /// Filter, sort and page a collection.
    pub async fn find<T: Indexed>(
        &self,
        filter: &Filter,
        sorter: &Sorter,
        sublist: Sublist,
    ) -> Result<IndexResult<T>, IndexError> {
        let mut hits = self.matching(T::TYPE, filter).await?;
        hits.sort_by(|a, b| sorter.compare((a.0.as_str(), &a.1), (b.0.as_str(), &b.1)));
        let total_count = hits.len() as u64;

        let results = hits
            .into_iter()
            .skip(sublist.offset)
            .take(sublist.limit)
            .map(|(uuid, doc)| {
                serde_json::from_value(doc).map_err(|e| {
                    StorageError::SerializationError(format!("index document {uuid}: {e}"))
                })
            })
            .collect::<Result<Vec<T>, StorageError>>()?;

        Ok(IndexResult {
            total_count,
            offset: sublist.offset,
            limit: results.len(),
            results,
        })
    }

    pub async fn count(&self, entity_type: EntityType, filter: &Filter) -> Result<u64, IndexError> {
        Ok(self.matching(entity_type, filter).await?.len() as u64)
    }

    /// Keys of every matching document, sorted.
    pub async fn find_uuids(
        &self,
        entity_type: EntityType,
        filter: &Filter,
    ) -> Result<Vec<String>, IndexError> {
        let mut uuids: Vec<String> = self
            .matching(entity_type, filter)
            .await?
            .into_iter()
            .map(|(uuid, _)| uuid)
            .collect();
        uuids.sort();
        Ok(uuids)
    }

    /// Parent, grandparent, ... up to the root, as currently indexed.
    ///
    /// Stops at the first ancestor that is not indexed.
    pub async fn get_ancestors(&self, aip: &IndexedAip) -> Result<Vec<IndexedAip>, IndexError> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::from([aip.id.clone()]);
        let mut next = aip.parent_id.clone();

        while let Some(parent_id) = next {
            if !visited.insert(parent_id.clone()) {
                return Err(IndexError::CyclicAncestry {
                    id: aip.id.clone(),
                    repeated: parent_id,
                });
            }
            match self.retrieve::<IndexedAip>(&parent_id).await {
                Ok(parent) => {
                    next = parent.parent_id.clone();
                    ancestors.push(parent);
                }
                Err(IndexError::NotFound(_)) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(ancestors)
    }

    // ---------------------------------------------------------------
    // Projection of store records
    // ---------------------------------------------------------------

    /// Index an AIP with its representations and preservation metadata,
    /// dropping child documents the AIP no longer has.
    pub async fn index_aip(&self, snapshot: &AipSnapshot) -> Result<(), IndexError> {
        let aip_id = &snapshot.aip.id;
        self.upsert(&IndexedAip::project(snapshot)).await?;

        let representations: Vec<IndexedRepresentation> = snapshot
            .representations
            .iter()
            .map(IndexedRepresentation::project)
            .collect();
        self.replace_children(aip_id, &representations).await?;

        let preservation: Vec<IndexedPreservationMetadata> = snapshot
            .preservation
            .iter()
            .map(IndexedPreservationMetadata::project)
            .collect();
        self.replace_children(aip_id, &preservation).await?;

        debug!(
            aip = %aip_id,
            representations = representations.len(),
            preservation = preservation.len(),
            "Indexed AIP"
        );
        Ok(())
    }

    /// Remove an AIP and every document it owns.
    pub async fn remove_aip(&self, snapshot: &AipSnapshot) -> Result<(), IndexError> {
        let aip_id = &snapshot.aip.id;
        self.delete(EntityType::Aip, aip_id).await?;
        for entity_type in [EntityType::Representation, EntityType::PreservationMetadata] {
            for uuid in self.child_uuids(entity_type, aip_id).await? {
                self.delete(entity_type, &uuid).await?;
            }
        }
        debug!(aip = %aip_id, "Removed AIP from index");
        Ok(())
    }

    async fn replace_children<T: Indexed>(&self, aip_id: &str, docs: &[T]) -> Result<(), IndexError> {
        let keep: HashSet<String> = docs.iter().map(Indexed::uuid).collect();
        for uuid in self.child_uuids(T::TYPE, aip_id).await? {
            if !keep.contains(&uuid) {
                self.delete(T::TYPE, &uuid).await?;
            }
        }
        for doc in docs {
            self.upsert(doc).await?;
        }
        Ok(())
    }

    /// Documents of `entity_type` owned by `aip_id`, committed or staged.
    async fn child_uuids(&self, entity_type: EntityType, aip_id: &str) -> Result<Vec<String>, IndexError> {
        let mut uuids = self
            .find_uuids(entity_type, &Filter::simple("aip_id", aip_id))
            .await?;
        {
            let staged = self.staged.lock().await;
            for ((t, uuid), value) in staged.iter() {
                let owner = value
                    .as_ref()
                    .and_then(|doc| doc.get("aip_id"))
                    .and_then(Value::as_str);
                if *t == entity_type && owner == Some(aip_id) {
                    uuids.push(uuid.clone());
                }
            }
        }
        uuids.sort();
        uuids.dedup();
        Ok(uuids)
    }

    /// Recompute one document from the store. An object missing from the
    /// store has its document removed.
    pub async fn reindex_object(
        &self,
        entity_type: EntityType,
        uuid: &str,
        model: &ModelService,
    ) -> Result<ReindexOutcome, IndexError> {
        let found = match entity_type {
            EntityType::Aip => match present(model.retrieve_aip(uuid).await)? {
                Some(_) => {
                    let snapshot = model.retrieve_snapshot(uuid).await?;
                    self.upsert(&IndexedAip::project(&snapshot)).await?;
                    true
                }
                None => false,
            },
            EntityType::Representation => {
                let (aip_id, rep_id) = split_child_uuid(uuid)?;
                match present(model.retrieve_representation(&aip_id, &rep_id).await)? {
                    Some(rep) => {
                        self.upsert(&IndexedRepresentation::project(&rep)).await?;
                        true
                    }
                    None => false,
                }
            }
            EntityType::PreservationMetadata => {
                let (aip_id, pm_id) = split_child_uuid(uuid)?;
                match present(model.retrieve_preservation_metadata(&aip_id, &pm_id).await)? {
                    Some(pm) => {
                        self.upsert(&IndexedPreservationMetadata::project(&pm)).await?;
                        true
                    }
                    None => false,
                }
            }
            EntityType::LogEntry => match present(model.retrieve_log_entry(uuid).await)? {
                Some(entry) => {
                    self.upsert(&IndexedLogEntry::project(&entry)).await?;
                    true
                }
                None => false,
            },
        };

        if found {
            Ok(ReindexOutcome::Indexed)
        } else {
            self.delete(entity_type, uuid).await?;
            Ok(ReindexOutcome::Removed)
        }
    }

    /// Rebuild a collection from the store: reindex every stored object,
    /// drop documents whose object no longer exists, then commit.
    ///
    /// Per-object failures are counted in the summary; the rebuild goes on.
    #[instrument(skip(self, model))]
    pub async fn reindex_all(
        &self,
        entity_type: EntityType,
        model: &ModelService,
    ) -> Result<ReindexSummary, IndexError> {
        let stored = stored_uuids(model, entity_type).await?;
        let mut summary = ReindexSummary {
            entity_type,
            indexed: 0,
            removed: 0,
            failed: 0,
            failures: Vec::new(),
        };

        for uuid in &stored {
            match self.reindex_object(entity_type, uuid, model).await {
                Ok(ReindexOutcome::Indexed) => summary.indexed += 1,
                Ok(ReindexOutcome::Removed) => summary.removed += 1,
                Err(err) => {
                    warn!(entity_type = %entity_type, id = %uuid, error = %err, "Reindex failed");
                    summary.failed += 1;
                    summary.failures.push(ReindexFailure {
                        id: uuid.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let stored: HashSet<&String> = stored.iter().collect();
        let mut indexed = self.collection(entity_type)?.keys().await?;
        {
            let staged = self.staged.lock().await;
            indexed.extend(
                staged
                    .iter()
                    .filter(|((t, _), value)| *t == entity_type && value.is_some())
                    .map(|((_, uuid), _)| uuid.clone()),
            );
        }
        indexed.sort();
        indexed.dedup();
        for orphan in indexed.iter().filter(|uuid| !stored.contains(uuid)) {
            self.delete(entity_type, orphan).await?;
            summary.removed += 1;
        }

        self.commit().await?;
        info!(
            entity_type = %entity_type,
            indexed = summary.indexed,
            removed = summary.removed,
            failed = summary.failed,
            "Reindex complete"
        );
        Ok(summary)
    }
}

impl std::fmt::Debug for IndexService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexService")
            .field("backend", &self.backend.name())
            .field("root", &self.root)
            .field("auto_commit", &self.config.auto_commit)
            .finish()
    }
}

/// Keys of every object of a type held by the store, sorted.
pub async fn stored_uuids(
    model: &ModelService,
    entity_type: EntityType,
) -> Result<Vec<String>, IndexError> {
    let mut uuids = match entity_type {
        EntityType::Aip => model.list_aip_ids().await?,
        EntityType::Representation => {
            let mut uuids = Vec::new();
            for aip in model.list_aips().await? {
                uuids.extend(aip.representation_ids.iter().map(|rep| child_uuid(&aip.id, rep)));
            }
            uuids
        }
        EntityType::PreservationMetadata => {
            let mut uuids = Vec::new();
            for aip_id in model.list_aip_ids().await? {
                match model.list_preservation_metadata(&aip_id).await {
                    Ok(pms) => uuids.extend(pms.iter().map(|pm| child_uuid(&pm.aip_id, &pm.id))),
                    // Deleted while listing.
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
            }
            uuids
        }
        EntityType::LogEntry => model
            .list_log_entries()
            .await?
            .into_iter()
            .map(|entry| entry.id)
            .collect(),
    };
    uuids.sort();
    Ok(uuids)
}

fn present<T>(result: Result<T, ModelError>) -> Result<Option<T>, IndexError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn decodes_as(entity_type: EntityType, doc: Value) -> bool {
    match entity_type {
        EntityType::Aip => serde_json::from_value::<IndexedAip>(doc).is_ok(),
        EntityType::Representation => serde_json::from_value::<IndexedRepresentation>(doc).is_ok(),
        EntityType::PreservationMetadata => {
            serde_json::from_value::<IndexedPreservationMetadata>(doc).is_ok()
        }
        EntityType::LogEntry => serde_json::from_value::<IndexedLogEntry>(doc).is_ok(),
    }
}
