// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! The authoritative entity store.

use std::collections::HashSet;
use std::sync::Arc;

use archivum_storage::typed::{get_json, put_json};
use archivum_storage::{copy_tree, InMemoryBackend, StorageBackend, StoragePath, TypedStore};
use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::entities::{
    Aip, AipManifest, AipSnapshot, DescriptiveManifest, DescriptiveMetadata, FileRef, LogEntry,
    PreservationKind, PreservationMetadata, PreservationRecord, Representation,
    RepresentationManifest,
};
use crate::error::ModelError;
use crate::layout;
use crate::observer::ModelObserver;

const MAX_ID_LEN: usize = 255;

/// What a representation directory in an ingest source contains.
#[derive(Debug, Default)]
struct RepresentationSource {
    manifest_path: Option<StoragePath>,
    manifest: Option<RepresentationManifest>,
    has_data: bool,
    preservation: Vec<(String, StoragePath)>,
}

/// What an AIP ingest source contains, validated before anything is written.
#[derive(Debug)]
struct AipSource {
    manifest: AipManifest,
    descriptive: Vec<(String, DescriptiveManifest)>,
    preservation: Vec<(String, StoragePath)>,
    representations: Vec<(String, StoragePath, RepresentationSource)>,
}

/// CRUD over AIPs and everything they own, backed by a [`StorageBackend`].
///
/// Mutations are serialized within one service; reads are not. Every
/// successful mutation is published to the registered observers.
pub struct ModelService {
    backend: Arc<dyn StorageBackend>,
    log: TypedStore,
    observers: Arc<RwLock<Vec<Arc<dyn ModelObserver>>>>,
    write_lock: Mutex<()>,
}

impl ModelService {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Result<Self, ModelError> {
        let log = TypedStore::new(Arc::clone(&backend), layout::log_root()?);
        Ok(Self {
            backend,
            log,
            observers: Arc::new(RwLock::new(Vec::new())),
            write_lock: Mutex::new(()),
        })
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub async fn register_observer(&self, observer: Arc<dyn ModelObserver>) {
        self.observers.write().await.push(observer);
    }

    /// Names of registered observers.
    pub async fn observers(&self) -> Vec<String> {
        self.observers
            .read()
            .await
            .iter()
            .map(|o| o.name().to_string())
            .collect()
    }

    // ---------------------------------------------------------------
    // AIPs
    // ---------------------------------------------------------------

    /// Ingest a new AIP from `source_path` in `source`.
    #[instrument(skip(self, source))]
    pub async fn create_aip(
        &self,
        id: &str,
        source: &dyn StorageBackend,
        source_path: &StoragePath,
    ) -> Result<Aip, ModelError> {
        validate_id("aip", id)?;
        let aip = {
            let _guard = self.write_lock.lock().await;
            if self.backend.exists(&layout::aip_record(id)?).await? {
                return Err(ModelError::AlreadyExists(format!("aip {id}")));
            }

            let plan = read_aip_source(source, source_path).await?;
            self.check_parent(id, plan.manifest.parent_id.as_deref()).await?;

            let now = Utc::now();
            let mut aip = Aip {
                id: id.to_string(),
                parent_id: plan.manifest.parent_id.clone(),
                state: plan.manifest.state,
                permissions: plan.manifest.permissions.clone(),
                representation_ids: Vec::new(),
                created_on: now,
                updated_on: now,
            };
            if let Err(err) = self.write_aip(&mut aip, source, &plan).await {
                self.roll_back(id).await;
                return Err(err);
            }
            aip
        };

        info!(id = %id, representations = aip.representation_ids.len(), "Created AIP");
        self.publish_aip_changed(id).await;
        Ok(aip)
    }

    /// Replace the content of an existing AIP with `source_path` in `source`.
    ///
    /// The creation timestamp is kept. If writing the new content fails the
    /// previous content is put back.
    #[instrument(skip(self, source))]
    pub async fn update_aip(
        &self,
        id: &str,
        source: &dyn StorageBackend,
        source_path: &StoragePath,
    ) -> Result<Aip, ModelError> {
        validate_id("aip", id)?;
        let aip = {
            let _guard = self.write_lock.lock().await;
            let existing = self.retrieve_aip(id).await?;

            let plan = read_aip_source(source, source_path).await?;
            self.check_parent(id, plan.manifest.parent_id.as_deref()).await?;

            let root = layout::aip_root(id)?;
            let backup = InMemoryBackend::new();
            copy_tree(self.backend.as_ref(), &root, &backup, &root).await?;

            if let Err(err) = self.backend.delete_under(&root).await {
                self.restore(id, &root, &backup).await;
                return Err(err.into());
            }
            let mut aip = Aip {
                id: id.to_string(),
                parent_id: plan.manifest.parent_id.clone(),
                state: plan.manifest.state,
                permissions: plan.manifest.permissions.clone(),
                representation_ids: Vec::new(),
                created_on: existing.created_on,
                updated_on: Utc::now(),
            };
            if let Err(err) = self.write_aip(&mut aip, source, &plan).await {
                self.restore(id, &root, &backup).await;
                return Err(err);
            }
            aip
        };

        info!(id = %id, representations = aip.representation_ids.len(), "Updated AIP");
        self.publish_aip_changed(id).await;
        Ok(aip)
    }

    /// Re-parent an AIP. `None` makes it a root.
    #[instrument(skip(self))]
    pub async fn move_aip(&self, id: &str, new_parent: Option<&str>) -> Result<Aip, ModelError> {
        let aip = {
            let _guard = self.write_lock.lock().await;
            let mut aip = self.retrieve_aip(id).await?;
            self.check_parent(id, new_parent).await?;

            aip.parent_id = new_parent.map(str::to_string);
            aip.updated_on = Utc::now();
            put_json(self.backend.as_ref(), &layout::aip_record(id)?, &aip).await?;
            aip
        };

        info!(id = %id, parent = ?aip.parent_id, "Moved AIP");
        self.publish_aip_changed(id).await;
        Ok(aip)
    }

    /// Delete an AIP with its representations, preservation metadata and
    /// descriptive metadata.
    #[instrument(skip(self))]
    pub async fn delete_aip(&self, id: &str) -> Result<(), ModelError> {
        let snapshot = {
            let _guard = self.write_lock.lock().await;
            let snapshot = self.retrieve_snapshot(id).await?;
            let removed = self.backend.delete_under(&layout::aip_root(id)?).await?;
            debug!(id = %id, removed = removed, "Removed AIP binaries");
            snapshot
        };

        info!(id = %id, "Deleted AIP");
        for observer in self.observer_list().await {
            if let Err(err) = observer.aip_deleted(&snapshot).await {
                warn!(observer = observer.name(), aip = %id, error = %err, "Observer failed on delete");
            }
        }
        Ok(())
    }

    pub async fn retrieve_aip(&self, id: &str) -> Result<Aip, ModelError> {
        get_json(self.backend.as_ref(), &layout::aip_record(id)?)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("aip {id}")))
    }

    pub async fn aip_exists(&self, id: &str) -> Result<bool, ModelError> {
        Ok(self.backend.exists(&layout::aip_record(id)?).await?)
    }

    /// Ids of every stored AIP, in storage order.
    pub async fn list_aip_ids(&self) -> Result<Vec<String>, ModelError> {
        let root = layout::aips_root()?;
        Ok(self
            .backend
            .list_under(&root)
            .await?
            .into_iter()
            .filter(|path| path.len() == 3 && path.name() == layout::AIP_MANIFEST)
            .map(|path| path.segments()[1].clone())
            .collect())
    }

    pub async fn list_aips(&self) -> Result<Vec<Aip>, ModelError> {
        let mut aips = Vec::new();
        for id in self.list_aip_ids().await? {
            match self.retrieve_aip(&id).await {
                Ok(aip) => aips.push(aip),
                // Deleted between listing and reading.
                Err(ModelError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(aips)
    }

    /// The AIP with everything it owns.
    pub async fn retrieve_snapshot(&self, id: &str) -> Result<AipSnapshot, ModelError> {
        let aip = self.retrieve_aip(id).await?;
        let descriptive = self.list_descriptive_metadata(id).await?;
        let representations = self.list_representations(id).await?;
        let preservation = self.list_preservation_metadata(id).await?;
        Ok(AipSnapshot {
            aip,
            descriptive,
            representations,
            preservation,
        })
    }

    // ---------------------------------------------------------------
    // Representations
    // ---------------------------------------------------------------

    /// Ingest a representation directory (`representation.json`, `data/`,
    /// `preservation/`) into an existing AIP.
    #[instrument(skip(self, source))]
    pub async fn create_representation(
        &self,
        aip_id: &str,
        representation_id: &str,
        source: &dyn StorageBackend,
        source_path: &StoragePath,
    ) -> Result<Representation, ModelError> {
        validate_id("representation", representation_id)?;
        let representation = {
            let _guard = self.write_lock.lock().await;
            let mut aip = self.retrieve_aip(aip_id).await?;
            let record = layout::representation_record(aip_id, representation_id)?;
            if aip.representation_ids.iter().any(|r| r == representation_id)
                || self.backend.exists(&record).await?
            {
                return Err(ModelError::AlreadyExists(format!(
                    "representation {aip_id}/{representation_id}"
                )));
            }

            let mut plan = RepresentationSource::default();
            for path in source.list_under(source_path).await? {
                let rest = relative(&path, source_path)?;
                classify_representation_entry(&mut plan, rest, &path)?;
            }
            load_representation_manifest(source, &mut plan).await?;

            let written = self
                .write_representation(aip_id, representation_id, source, source_path, &plan)
                .await;
            let representation = match written {
                Ok(representation) => representation,
                Err(err) => {
                    let root = layout::representation_root(aip_id, representation_id)?;
                    if let Err(cleanup) = self.backend.delete_under(&root).await {
                        warn!(aip = %aip_id, error = %cleanup, "Failed to remove partial representation");
                    }
                    return Err(err);
                }
            };

            aip.representation_ids.push(representation_id.to_string());
            aip.updated_on = Utc::now();
            put_json(self.backend.as_ref(), &layout::aip_record(aip_id)?, &aip).await?;
            representation
        };

        info!(
            aip = %aip_id,
            representation = %representation_id,
            files = representation.files.len(),
            "Created representation"
        );
        self.publish_aip_changed(aip_id).await;
        Ok(representation)
    }

    pub async fn retrieve_representation(
        &self,
        aip_id: &str,
        representation_id: &str,
    ) -> Result<Representation, ModelError> {
        let path = layout::representation_record(aip_id, representation_id)?;
        get_json(self.backend.as_ref(), &path)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("representation {aip_id}/{representation_id}")))
    }

    /// Representations of an AIP in the AIP's order.
    pub async fn list_representations(&self, aip_id: &str) -> Result<Vec<Representation>, ModelError> {
        let aip = self.retrieve_aip(aip_id).await?;
        let mut representations = Vec::with_capacity(aip.representation_ids.len());
        for rep_id in &aip.representation_ids {
            representations.push(self.retrieve_representation(aip_id, rep_id).await?);
        }
        Ok(representations)
    }

    pub async fn retrieve_file_content(&self, file: &FileRef) -> Result<Vec<u8>, ModelError> {
        self.backend
            .get(&file.storage_path)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("file {}", file.storage_path)))
    }

    // ---------------------------------------------------------------
    // Metadata
    // ---------------------------------------------------------------

    /// Create or replace a preservation metadata record and its content.
    #[instrument(skip(self, content), fields(id = %record.id, aip = %record.aip_id))]
    pub async fn record_preservation_metadata(
        &self,
        record: PreservationRecord,
        content: &[u8],
    ) -> Result<PreservationMetadata, ModelError> {
        validate_id("preservation metadata", &record.id)?;
        let pm = {
            let _guard = self.write_lock.lock().await;
            let aip = self.retrieve_aip(&record.aip_id).await?;
            if let Some(rep_id) = record.representation_id.as_deref() {
                if !aip.representation_ids.iter().any(|r| r == rep_id) {
                    return Err(ModelError::NotFound(format!(
                        "representation {}/{rep_id}",
                        record.aip_id
                    )));
                }
            }

            let pm = PreservationMetadata {
                storage_path: layout::preservation_content(
                    &record.aip_id,
                    record.representation_id.as_deref(),
                    &record.id,
                )?,
                id: record.id,
                aip_id: record.aip_id,
                representation_id: record.representation_id,
                kind: record.kind,
            };
            self.backend.put(&pm.storage_path, content).await?;
            put_json(
                self.backend.as_ref(),
                &layout::preservation_record(&pm.aip_id, &pm.id)?,
                &pm,
            )
            .await?;
            pm
        };

        debug!(id = %pm.id, kind = pm.kind.as_str(), "Recorded preservation metadata");
        for observer in self.observer_list().await {
            if let Err(err) = observer.preservation_metadata_recorded(&pm).await {
                warn!(observer = observer.name(), id = %pm.id, error = %err, "Observer failed on preservation metadata");
            }
        }
        Ok(pm)
    }

    pub async fn list_preservation_metadata(
        &self,
        aip_id: &str,
    ) -> Result<Vec<PreservationMetadata>, ModelError> {
        self.read_records(&layout::preservation_records_root(aip_id)?).await
    }

    pub async fn retrieve_preservation_metadata(
        &self,
        aip_id: &str,
        pm_id: &str,
    ) -> Result<PreservationMetadata, ModelError> {
        get_json(self.backend.as_ref(), &layout::preservation_record(aip_id, pm_id)?)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("preservation metadata {aip_id}/{pm_id}")))
    }

    pub async fn retrieve_preservation_content(
        &self,
        pm: &PreservationMetadata,
    ) -> Result<Vec<u8>, ModelError> {
        self.backend
            .get(&pm.storage_path)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("preservation content {}", pm.storage_path)))
    }

    pub async fn list_descriptive_metadata(
        &self,
        aip_id: &str,
    ) -> Result<Vec<DescriptiveMetadata>, ModelError> {
        self.read_records(&layout::descriptive_root(aip_id)?).await
    }

    // ---------------------------------------------------------------
    // Action log
    // ---------------------------------------------------------------

    pub async fn add_log_entry(&self, entry: LogEntry) -> Result<LogEntry, ModelError> {
        validate_id("log entry", &entry.id)?;
        self.log.put(&entry.id, &entry).await?;
        debug!(id = %entry.id, method = %entry.action_method, "Added log entry");

        for observer in self.observer_list().await {
            if let Err(err) = observer.log_entry_added(&entry).await {
                warn!(observer = observer.name(), id = %entry.id, error = %err, "Observer failed on log entry");
            }
        }
        Ok(entry)
    }

    pub async fn retrieve_log_entry(&self, id: &str) -> Result<LogEntry, ModelError> {
        self.log
            .get(id)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("log entry {id}")))
    }

    pub async fn list_log_entries(&self) -> Result<Vec<LogEntry>, ModelError> {
        Ok(self
            .log
            .entries::<LogEntry>()
            .await?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect())
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    async fn observer_list(&self) -> Vec<Arc<dyn ModelObserver>> {
        self.observers.read().await.clone()
    }

    async fn publish_aip_changed(&self, id: &str) {
        let observers = self.observer_list().await;
        if observers.is_empty() {
            return;
        }
        let snapshot = match self.retrieve_snapshot(id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(aip = %id, error = %err, "Could not read AIP back for observers");
                return;
            }
        };
        for observer in observers {
            if let Err(err) = observer.aip_changed(&snapshot).await {
                warn!(observer = observer.name(), aip = %id, error = %err, "Observer failed on change");
            }
        }
    }

    async fn roll_back(&self, id: &str) {
        match layout::aip_root(id) {
            Ok(root) => match self.backend.delete_under(&root).await {
                Ok(removed) => debug!(id = %id, removed = removed, "Rolled back partially written AIP"),
                Err(err) => warn!(id = %id, error = %err, "Rollback of partially written AIP failed"),
            },
            Err(err) => warn!(id = %id, error = %err, "Rollback skipped"),
        }
    }

    /// Put back the subtree saved in `backup` after a failed replacement.
    async fn restore(&self, id: &str, root: &StoragePath, backup: &InMemoryBackend) {
        if let Err(err) = self.backend.delete_under(root).await {
            warn!(id = %id, error = %err, "Could not clear partially replaced AIP");
        }
        match copy_tree(backup, root, self.backend.as_ref(), root).await {
            Ok(restored) => debug!(id = %id, restored = restored.len(), "Restored previous AIP content"),
            Err(err) => warn!(id = %id, error = %err, "Restoring previous AIP content failed"),
        }
    }

    /// Reject a parent that is missing, is the AIP itself, or descends from it.
    async fn check_parent(&self, id: &str, parent: Option<&str>) -> Result<(), ModelError> {
        let mut next = parent.map(str::to_string);
        let mut visited = HashSet::new();
        while let Some(current) = next {
            if current == id {
                return Err(ModelError::ValidationFailed(format!(
                    "aip {id} cannot be placed below itself"
                )));
            }
            if !visited.insert(current.clone()) {
                // Pre-existing cycle above the new parent; it does not involve `id`.
                break;
            }
            let ancestor = match self.retrieve_aip(&current).await {
                Ok(ancestor) => ancestor,
                Err(ModelError::NotFound(_)) if Some(current.as_str()) == parent => {
                    return Err(ModelError::ValidationFailed(format!("parent aip {current} does not exist")));
                }
                Err(ModelError::NotFound(_)) => break,
                Err(err) => return Err(err),
            };
            next = ancestor.parent_id;
        }
        Ok(())
    }

    async fn write_aip(
        &self,
        aip: &mut Aip,
        source: &dyn StorageBackend,
        plan: &AipSource,
    ) -> Result<(), ModelError> {
        let id = aip.id.clone();

        for (dm_id, manifest) in &plan.descriptive {
            let record = DescriptiveMetadata {
                id: dm_id.clone(),
                aip_id: id.clone(),
                schema: manifest.schema.clone(),
                fields: manifest.fields.clone(),
            };
            put_json(self.backend.as_ref(), &layout::descriptive_record(&id, dm_id)?, &record).await?;
        }

        for (pm_id, path) in &plan.preservation {
            self.ingest_preservation(&id, None, pm_id, source, path).await?;
        }

        for (rep_id, rep_path, rep_plan) in &plan.representations {
            self.write_representation(&id, rep_id, source, rep_path, rep_plan)
                .await?;
            aip.representation_ids.push(rep_id.clone());
        }

        put_json(self.backend.as_ref(), &layout::aip_record(&id)?, &*aip).await?;
        Ok(())
    }

    async fn write_representation(
        &self,
        aip_id: &str,
        rep_id: &str,
        source: &dyn StorageBackend,
        source_path: &StoragePath,
        plan: &RepresentationSource,
    ) -> Result<Representation, ModelError> {
        let manifest = plan.manifest.clone().unwrap_or_default();

        let mut files = Vec::new();
        if plan.has_data {
            let data_root = layout::representation_data(aip_id, rep_id)?;
            let written = copy_tree(
                source,
                &source_path.child(layout::DATA)?,
                self.backend.as_ref(),
                &data_root,
            )
            .await?;
            // Digests are taken from what actually landed in storage.
            for path in written {
                let content = self
                    .backend
                    .get(&path)
                    .await?
                    .ok_or_else(|| ModelError::NotFound(format!("file {path}")))?;
                let id = relative(&path, &data_root)?.join("/");
                files.push(FileRef {
                    id,
                    size: content.len() as u64,
                    sha256: FileRef::digest(&content),
                    storage_path: path,
                });
            }
        }

        for (pm_id, path) in &plan.preservation {
            self.ingest_preservation(aip_id, Some(rep_id), pm_id, source, path)
                .await?;
        }

        let representation = Representation {
            id: rep_id.to_string(),
            aip_id: aip_id.to_string(),
            representation_type: manifest.representation_type,
            original: manifest.original,
            files,
        };
        put_json(
            self.backend.as_ref(),
            &layout::representation_record(aip_id, rep_id)?,
            &representation,
        )
        .await?;
        Ok(representation)
    }

    async fn ingest_preservation(
        &self,
        aip_id: &str,
        rep_id: Option<&str>,
        pm_id: &str,
        source: &dyn StorageBackend,
        path: &StoragePath,
    ) -> Result<(), ModelError> {
        let content = source
            .get(path)
            .await?
            .ok_or_else(|| ModelError::NotFound(format!("source {path}")))?;
        let pm = PreservationMetadata {
            id: pm_id.to_string(),
            aip_id: aip_id.to_string(),
            representation_id: rep_id.map(str::to_string),
            storage_path: layout::preservation_content(aip_id, rep_id, pm_id)?,
            kind: PreservationKind::Object,
        };
        self.backend.put(&pm.storage_path, &content).await?;
        put_json(
            self.backend.as_ref(),
            &layout::preservation_record(aip_id, pm_id)?,
            &pm,
        )
        .await?;
        Ok(())
    }

    async fn read_records<T: DeserializeOwned>(&self, root: &StoragePath) -> Result<Vec<T>, ModelError> {
        let mut records = Vec::new();
        for path in self.backend.list_under(root).await? {
            if path.len() != root.len() + 1 {
                continue;
            }
            if let Some(record) = get_json(self.backend.as_ref(), &path).await? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

impl std::fmt::Debug for ModelService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelService")
            .field("backend", &self.backend.name())
            .finish()
    }
}

fn validate_id(what: &str, id: &str) -> Result<(), ModelError> {
    if id.trim().is_empty() {
        return Err(ModelError::ValidationFailed(format!("{what} id must not be blank")));
    }
    if id == "." || id == ".." {
        return Err(ModelError::ValidationFailed(format!("{what} id '{id}' is reserved")));
    }
    if id.len() > MAX_ID_LEN {
        return Err(ModelError::ValidationFailed(format!(
            "{what} id longer than {MAX_ID_LEN} bytes"
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(ModelError::ValidationFailed(format!(
            "{what} id contains control characters"
        )));
    }
    Ok(())
}

fn relative<'a>(path: &'a StoragePath, root: &StoragePath) -> Result<&'a [String], ModelError> {
    path.strip_prefix(root)
        .ok_or_else(|| ModelError::ValidationFailed(format!("{path} is not below {root}")))
}

async fn read_manifest<T: DeserializeOwned>(
    source: &dyn StorageBackend,
    path: &StoragePath,
) -> Result<T, ModelError> {
    let bytes = source
        .get(path)
        .await?
        .ok_or_else(|| ModelError::NotFound(format!("source {path}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| ModelError::ValidationFailed(format!("malformed manifest {path}: {err}")))
}

async fn load_representation_manifest(
    source: &dyn StorageBackend,
    plan: &mut RepresentationSource,
) -> Result<(), ModelError> {
    if let Some(path) = &plan.manifest_path {
        plan.manifest = Some(read_manifest::<RepresentationManifest>(source, path).await?);
    }
    Ok(())
}

fn json_stem<'a>(name: &'a str, path: &StoragePath) -> Result<&'a str, ModelError> {
    let stem = layout::strip_json(name)
        .ok_or_else(|| ModelError::ValidationFailed(format!("expected a .json file at {path}")))?;
    validate_id("metadata", stem)?;
    Ok(stem)
}

fn classify_representation_entry(
    plan: &mut RepresentationSource,
    rest: &[String],
    path: &StoragePath,
) -> Result<(), ModelError> {
    match rest {
        [name] if name == layout::REPRESENTATION_MANIFEST => {
            plan.manifest_path = Some(path.clone());
        }
        [dir, _, ..] if dir == layout::DATA => {
            plan.has_data = true;
        }
        [dir, name] if dir == layout::PRESERVATION => {
            plan.preservation
                .push((json_stem(name, path)?.to_string(), path.clone()));
        }
        _ => {
            return Err(ModelError::ValidationFailed(format!(
                "unexpected entry {path} in representation source"
            )))
        }
    }
    Ok(())
}

/// Walk an AIP ingest source and check its shape without writing anything.
async fn read_aip_source(
    source: &dyn StorageBackend,
    source_path: &StoragePath,
) -> Result<AipSource, ModelError> {
    let mut manifest = None;
    let mut descriptive_paths = Vec::new();
    let mut preservation = Vec::new();
    let mut representations: Vec<(String, StoragePath, RepresentationSource)> = Vec::new();

    for path in source.list_under(source_path).await? {
        let rest = relative(&path, source_path)?;
        match rest {
            [name] if name == layout::AIP_MANIFEST => {
                manifest = Some(read_manifest::<AipManifest>(source, &path).await?);
            }
            [dir, name] if dir == layout::DESCRIPTIVE => {
                descriptive_paths.push((json_stem(name, &path)?.to_string(), path.clone()));
            }
            [dir, name] if dir == layout::PRESERVATION => {
                preservation.push((json_stem(name, &path)?.to_string(), path.clone()));
            }
            [dir, rep_id, tail @ ..] if dir == layout::REPRESENTATIONS && !tail.is_empty() => {
                validate_id("representation", rep_id)?;
                // Listing is ordered, so one representation's entries are contiguous.
                if representations.last().map(|(id, _, _)| id != rep_id).unwrap_or(true) {
                    let rep_root = source_path.join([layout::REPRESENTATIONS, rep_id.as_str()])?;
                    representations.push((rep_id.clone(), rep_root, RepresentationSource::default()));
                }
                if let Some((_, _, plan)) = representations.last_mut() {
                    classify_representation_entry(plan, tail, &path)?;
                }
            }
            _ => {
                return Err(ModelError::ValidationFailed(format!(
                    "unexpected entry {path} in aip source"
                )))
            }
        }
    }

    let manifest = manifest.ok_or_else(|| {
        ModelError::ValidationFailed(format!("source {source_path} has no {}", layout::AIP_MANIFEST))
    })?;
    if let Some(parent) = manifest.parent_id.as_deref() {
        validate_id("parent", parent)?;
    }

    // Parse every manifest before anything is written.
    let mut descriptive = Vec::with_capacity(descriptive_paths.len());
    for (dm_id, path) in descriptive_paths {
        descriptive.push((dm_id, read_manifest::<DescriptiveManifest>(source, &path).await?));
    }
    for (_, _, plan) in &mut representations {
        load_representation_manifest(source, plan).await?;
    }

    Ok(AipSource {
        manifest,
        descriptive,
        preservation,
        representations,
    })
}
