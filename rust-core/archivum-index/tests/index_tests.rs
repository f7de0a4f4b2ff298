// SPDX-License-Identifier: PMPL-1.0-or-later
//! Integration tests for the index projection.

use std::sync::Arc;

use archivum_index::{
    EntityType, Filter, IndexConfig, IndexError, IndexModelObserver, IndexService, IndexedAip,
    IndexedLogEntry, IndexedPreservationMetadata, IndexedRepresentation, Sorter, Sublist,
};
use archivum_model::{
    AipState, ErrorKind, LogEntry, ModelService, Permissions, PermissionType, PreservationRecord,
};
use archivum_storage::{InMemoryBackend, StorageBackend, StoragePath};
use chrono::Utc;

struct Fixture {
    source: InMemoryBackend,
    index_backend: InMemoryBackend,
    model: ModelService,
    index: Arc<IndexService>,
}

async fn fixture(config: IndexConfig) -> Fixture {
    let store_backend = InMemoryBackend::new();
    let index_backend = InMemoryBackend::new();
    let model = ModelService::new(Arc::new(store_backend)).unwrap();
    let index = Arc::new(IndexService::new(Arc::new(index_backend.clone()), config).unwrap());
    model
        .register_observer(Arc::new(IndexModelObserver::new(index.clone())))
        .await;
    Fixture {
        source: InMemoryBackend::new(),
        index_backend,
        model,
        index,
    }
}

impl Fixture {
    /// Write a source AIP below `corpora/{name}` and ingest it as `id`.
    async fn create(&self, id: &str, parent: Option<&str>, level: &str, reps: &[&str]) {
        let root = format!("corpora/{id}");
        let manifest = serde_json::json!({
            "parent_id": parent,
            "permissions": {"users": {"READ": ["alice"]}, "groups": {"READ": ["archivists"]}}
        });
        self.put(&format!("{root}/aip.json"), manifest.to_string().as_bytes()).await;
        let descriptive = serde_json::json!({
            "schema": "ead",
            "fields": {
                "level": level,
                "title": format!("Title of {id}"),
                "description": "Example description",
                "date_initial": "2001-01-01",
                "date_final": "2010-12-31"
            }
        });
        self.put(&format!("{root}/descriptive/ead.json"), descriptive.to_string().as_bytes())
            .await;
        for rep in reps {
            self.put(
                &format!("{root}/representations/{rep}/data/file.txt"),
                format!("content of {id}/{rep}").as_bytes(),
            )
            .await;
        }
        self.model
            .create_aip(id, &self.source, &StoragePath::parse(&root).unwrap())
            .await
            .unwrap();
    }

    async fn put(&self, path: &str, content: &[u8]) {
        self.source
            .put(&StoragePath::parse(path).unwrap(), content)
            .await
            .unwrap();
    }
}

fn indexed_aip(id: &str, parent: Option<&str>) -> IndexedAip {
    let now = Utc::now();
    IndexedAip {
        id: id.into(),
        parent_id: parent.map(str::to_string),
        state: AipState::Active,
        permissions: Permissions::default(),
        level: None,
        title: None,
        description: None,
        date_initial: None,
        date_final: None,
        representation_count: 0,
        has_representations: false,
        created_on: now,
        updated_on: now,
    }
}

#[tokio::test]
async fn test_create_find_delete_scenario() {
    let fx = fixture(IndexConfig::default()).await;
    fx.create("A", None, "fonds", &["R1"]).await;
    fx.index.reindex_all(EntityType::Aip, &fx.model).await.unwrap();

    let found = fx
        .index
        .find::<IndexedAip>(&Filter::simple("id", "A"), &Sorter::none(), Sublist::default())
        .await
        .unwrap();
    assert_eq!(found.total_count, 1);
    let doc = &found.results[0];
    assert_eq!(doc.id, "A");
    assert_eq!(doc.parent_id, None);
    assert_eq!(
        doc.permissions.users_with(PermissionType::Read).collect::<Vec<_>>(),
        vec!["alice"]
    );
    assert_eq!(doc.level.as_deref(), Some("fonds"));
    assert_eq!(doc.title.as_deref(), Some("Title of A"));
    assert_eq!(doc.description.as_deref(), Some("Example description"));
    assert_eq!(doc.date_initial.as_deref(), Some("2001-01-01"));
    assert_eq!(doc.date_final.as_deref(), Some("2010-12-31"));

    let reps = fx
        .index
        .find::<IndexedRepresentation>(
            &Filter::simple("aip_id", "A"),
            &Sorter::none(),
            Sublist::default(),
        )
        .await
        .unwrap();
    assert_eq!(reps.total_count, 1);
    assert_eq!(reps.results[0].uuid, "A/R1");

    fx.model.delete_aip("A").await.unwrap();

    let err = fx.index.retrieve::<IndexedAip>("A").await.unwrap_err();
    assert!(matches!(err, IndexError::NotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(fx.index.count(EntityType::Aip, &Filter::all()).await.unwrap(), 0);
    assert_eq!(
        fx.index.count(EntityType::Representation, &Filter::all()).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_find_paginates_with_stable_order() {
    let fx = fixture(IndexConfig::default()).await;
    for id in ["a5", "a1", "a3", "a2", "a4"] {
        fx.create(id, None, "fonds", &[]).await;
    }

    let page = fx
        .index
        .find::<IndexedAip>(&Filter::all(), &Sorter::ascending("level"), Sublist::new(1, 2))
        .await
        .unwrap();
    assert_eq!(page.total_count, 5);
    assert_eq!(page.offset, 1);
    assert_eq!(page.limit, 2);
    let ids: Vec<_> = page.results.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a2", "a3"]);

    let tail = fx
        .index
        .find::<IndexedAip>(&Filter::all(), &Sorter::descending("id"), Sublist::new(4, 10))
        .await
        .unwrap();
    assert_eq!(tail.limit, 1);
    assert_eq!(tail.results[0].id, "a1");

    let past_end = fx
        .index
        .find::<IndexedAip>(&Filter::all(), &Sorter::none(), Sublist::new(10, 10))
        .await
        .unwrap();
    assert_eq!(past_end.total_count, 5);
    assert!(past_end.results.is_empty());
}

#[tokio::test]
async fn test_top_level_filter_and_ancestors() {
    let fx = fixture(IndexConfig::default()).await;
    fx.create("C", None, "fonds", &[]).await;
    fx.create("B", Some("C"), "series", &[]).await;
    fx.create("A", Some("B"), "file", &[]).await;

    let roots = fx
        .index
        .find::<IndexedAip>(
            &Filter::all().and_empty("parent_id"),
            &Sorter::none(),
            Sublist::default(),
        )
        .await
        .unwrap();
    assert_eq!(roots.total_count, 1);
    assert_eq!(roots.results[0].id, "C");

    let a = fx.index.retrieve::<IndexedAip>("A").await.unwrap();
    let ancestors = fx.index.get_ancestors(&a).await.unwrap();
    let ids: Vec<_> = ancestors.iter().map(|x| x.id.as_str()).collect();
    assert_eq!(ids, vec!["B", "C"]);

    let c = fx.index.retrieve::<IndexedAip>("C").await.unwrap();
    assert!(fx.index.get_ancestors(&c).await.unwrap().is_empty());

    let series_or_file = Filter::all().and_one_of("level", ["series", "file"]);
    assert_eq!(fx.index.count(EntityType::Aip, &series_or_file).await.unwrap(), 2);
}

#[tokio::test]
async fn test_move_updates_projection() {
    let fx = fixture(IndexConfig::default()).await;
    fx.create("P", None, "fonds", &[]).await;
    fx.create("A", None, "file", &[]).await;

    fx.model.move_aip("A", Some("P")).await.unwrap();
    let a = fx.index.retrieve::<IndexedAip>("A").await.unwrap();
    assert_eq!(a.parent_id.as_deref(), Some("P"));
    assert_eq!(fx.index.get_ancestors(&a).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cyclic_ancestry_terminates() {
    let fx = fixture(IndexConfig::default()).await;
    fx.index.upsert(&indexed_aip("A", Some("B"))).await.unwrap();
    fx.index.upsert(&indexed_aip("B", Some("A"))).await.unwrap();

    let a = fx.index.retrieve::<IndexedAip>("A").await.unwrap();
    match fx.index.get_ancestors(&a).await.unwrap_err() {
        IndexError::CyclicAncestry { id, repeated } => {
            assert_eq!(id, "A");
            assert_eq!(repeated, "A");
        }
        other => panic!("expected CyclicAncestry, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_ancestor_stops_walk() {
    let fx = fixture(IndexConfig::default()).await;
    fx.index.upsert(&indexed_aip("A", Some("B"))).await.unwrap();
    fx.index.upsert(&indexed_aip("B", Some("gone"))).await.unwrap();

    let a = fx.index.retrieve::<IndexedAip>("A").await.unwrap();
    let ancestors = fx.index.get_ancestors(&a).await.unwrap();
    assert_eq!(ancestors.len(), 1);
    assert_eq!(ancestors[0].id, "B");
}

#[tokio::test]
async fn test_reindex_ten_aips_and_prune_orphans() {
    let fx = fixture(IndexConfig::default()).await;
    for i in 0..10 {
        fx.create(&format!("aip-{i}"), None, "fonds", &["R1"]).await;
    }
    fx.index.clear(EntityType::Aip).await.unwrap();
    assert_eq!(fx.index.count(EntityType::Aip, &Filter::all()).await.unwrap(), 0);

    fx.index.upsert(&indexed_aip("stale", None)).await.unwrap();

    let summary = fx.index.reindex_all(EntityType::Aip, &fx.model).await.unwrap();
    assert_eq!(summary.indexed, 10);
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(fx.index.count(EntityType::Aip, &Filter::all()).await.unwrap(), 10);
    assert!(fx.index.retrieve::<IndexedAip>("stale").await.is_err());

    let reps = fx
        .index
        .reindex_all(EntityType::Representation, &fx.model)
        .await
        .unwrap();
    assert_eq!(reps.indexed, 10);
}

#[tokio::test]
async fn test_ids_with_commas_are_indexed() {
    let fx = fixture(IndexConfig::default()).await;
    fx.create("id,with,commas", None, "fonds", &[]).await;
    let doc = fx.index.retrieve::<IndexedAip>("id,with,commas").await.unwrap();
    assert_eq!(doc.id, "id,with,commas");
}

#[tokio::test]
async fn test_staged_writes_are_invisible_until_commit() {
    let fx = fixture(IndexConfig {
        auto_commit: false,
        ..Default::default()
    })
    .await;
    fx.create("A", None, "fonds", &["R1"]).await;

    assert!(fx.index.staged_count().await >= 2);
    assert!(fx.index.retrieve::<IndexedAip>("A").await.is_err());

    let applied = fx.index.commit().await.unwrap();
    assert!(applied >= 2);
    assert_eq!(fx.index.staged_count().await, 0);
    assert!(fx.index.retrieve::<IndexedAip>("A").await.is_ok());
    assert!(fx
        .index
        .retrieve::<IndexedRepresentation>("A/R1")
        .await
        .is_ok());
}

#[tokio::test]
async fn test_failed_commit_keeps_writes_staged() {
    let fx = fixture(IndexConfig {
        auto_commit: false,
        ..Default::default()
    })
    .await;
    fx.create("A", None, "fonds", &[]).await;
    let staged = fx.index.staged_count().await;

    fx.index_backend.set_available(false);
    let err = fx.index.commit().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transient);
    assert_eq!(fx.index.staged_count().await, staged);

    fx.index_backend.set_available(true);
    assert_eq!(fx.index.commit().await.unwrap(), staged);
}

#[tokio::test]
async fn test_update_drops_stale_representations() {
    let fx = fixture(IndexConfig::default()).await;
    fx.create("A", None, "fonds", &["R1", "R2"]).await;
    assert_eq!(
        fx.index
            .count(EntityType::Representation, &Filter::simple("aip_id", "A"))
            .await
            .unwrap(),
        2
    );

    fx.put("v2/aip.json", b"{}").await;
    fx.put("v2/representations/R3/data/x", b"x").await;
    fx.model
        .update_aip("A", &fx.source, &StoragePath::parse("v2").unwrap())
        .await
        .unwrap();

    let reps = fx
        .index
        .find_uuids(EntityType::Representation, &Filter::simple("aip_id", "A"))
        .await
        .unwrap();
    assert_eq!(reps, vec!["A/R3".to_string()]);
    let aip = fx.index.retrieve::<IndexedAip>("A").await.unwrap();
    assert_eq!(aip.level, None);
    assert_eq!(aip.representation_count, 1);
}

#[tokio::test]
async fn test_index_outage_is_reconciled_by_reindex() {
    let fx = fixture(IndexConfig::default()).await;
    fx.index_backend.set_available(false);

    // The store write succeeds even though the index is down.
    fx.create("A", None, "fonds", &["R1"]).await;
    fx.model
        .record_preservation_metadata(PreservationRecord::event("ev1", "A"), b"{}")
        .await
        .unwrap();

    fx.index_backend.set_available(true);
    assert!(fx.index.retrieve::<IndexedAip>("A").await.is_err());

    for entity_type in [
        EntityType::Aip,
        EntityType::Representation,
        EntityType::PreservationMetadata,
    ] {
        let summary = fx.index.reindex_all(entity_type, &fx.model).await.unwrap();
        assert_eq!(summary.failed, 0);
    }
    assert!(fx.index.retrieve::<IndexedAip>("A").await.is_ok());
    assert!(fx
        .index
        .retrieve::<IndexedPreservationMetadata>("A/ev1")
        .await
        .is_ok());
}

#[tokio::test]
async fn test_log_entries_are_indexed_and_reindexed() {
    let fx = fixture(IndexConfig::default()).await;
    let entry = fx
        .model
        .add_log_entry(LogEntry::new("ingest", "create_aip", "admin").related_to("A"))
        .await
        .unwrap();
    assert!(fx.index.retrieve::<IndexedLogEntry>(&entry.id).await.is_ok());

    fx.index.clear(EntityType::LogEntry).await.unwrap();
    let summary = fx
        .index
        .reindex_all(EntityType::LogEntry, &fx.model)
        .await
        .unwrap();
    assert_eq!(summary.indexed, 1);

    let by_user = fx
        .index
        .count(EntityType::LogEntry, &Filter::simple("username", "admin"))
        .await
        .unwrap();
    assert_eq!(by_user, 1);
}

#[tokio::test]
async fn test_optimize_purges_malformed_documents() {
    let fx = fixture(IndexConfig::default()).await;
    fx.create("A", None, "fonds", &[]).await;
    fx.index_backend
        .put(&StoragePath::parse("index/aip/broken").unwrap(), b"{\"id\":1}")
        .await
        .unwrap();

    assert_eq!(fx.index.optimize(EntityType::Aip).await.unwrap(), 1);
    assert_eq!(fx.index.count(EntityType::Aip, &Filter::all()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_invalid_filter_is_rejected() {
    let fx = fixture(IndexConfig::default()).await;
    let err = fx
        .index
        .count(EntityType::Aip, &Filter::all().and_range("date_initial", None, None))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}
