// SPDX-License-Identifier: PMPL-1.0-or-later
#![allow(dead_code)]

use std::sync::Arc;

use archivum_index::{IndexConfig, IndexModelObserver, IndexService};
use archivum_model::ModelService;
use archivum_plugins::RepositoryContext;
use archivum_storage::{InMemoryBackend, StorageBackend, StoragePath};

pub struct Repo {
    pub store: InMemoryBackend,
    pub source: InMemoryBackend,
    pub ctx: RepositoryContext,
}

/// A repository on in-memory backends. With `observe`, the index follows
/// every store mutation.
pub async fn repo(observe: bool) -> Repo {
    let store = InMemoryBackend::new();
    let model = Arc::new(ModelService::new(Arc::new(store.clone())).unwrap());
    let index = Arc::new(
        IndexService::new(Arc::new(InMemoryBackend::new()), IndexConfig::default()).unwrap(),
    );
    if observe {
        model
            .register_observer(Arc::new(IndexModelObserver::new(index.clone())))
            .await;
    }
    Repo {
        store,
        source: InMemoryBackend::new(),
        ctx: RepositoryContext::new(model, index),
    }
}

impl Repo {
    /// Ingest AIP `id` with one original representation per `(rep, content)`.
    pub async fn create(&self, id: &str, reps: &[(&str, &str)]) {
        let root = format!("incoming/{id}");
        self.put(&format!("{root}/aip.json"), b"{}").await;
        self.put(
            &format!("{root}/descriptive/dc.json"),
            serde_json::json!({"schema": "dc", "fields": {"title": id}})
                .to_string()
                .as_bytes(),
        )
        .await;
        for (rep, content) in reps {
            self.put(
                &format!("{root}/representations/{rep}/representation.json"),
                br#"{"type": "MIXED", "original": true}"#,
            )
            .await;
            self.put(
                &format!("{root}/representations/{rep}/data/file.txt"),
                content.as_bytes(),
            )
            .await;
        }
        self.ctx
            .model
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
