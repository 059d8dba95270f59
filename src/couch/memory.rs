use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Document, DocumentStore, Revision, ViewRow};
use crate::error::{Result, StorageError};
use crate::storage::index;

/// In-process document store with CouchDB revision semantics.
///
/// Views are evaluated by scanning every document through the same emission
/// rules the design document installs, so listings match a real server.
/// Suitable for tests and small single-process deployments.
#[derive(Default)]
pub struct MemoryDocumentStore {
    // `None` until the database is created.
    docs: RwLock<Option<BTreeMap<String, Document>>>,
}

impl MemoryDocumentStore {
    /// A store whose database does not exist yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose database already exists (but has no design document).
    pub fn with_database() -> Self {
        Self {
            docs: RwLock::new(Some(BTreeMap::new())),
        }
    }

    #[cfg(test)]
    pub(crate) async fn contains(&self, id: &str) -> bool {
        self.docs
            .read()
            .await
            .as_ref()
            .is_some_and(|docs| docs.contains_key(id))
    }
}

fn next_revision(previous: Option<&Revision>) -> Revision {
    let generation = previous
        .and_then(|rev| rev.as_str().split_once('-'))
        .and_then(|(n, _)| n.parse::<u64>().ok())
        .unwrap_or(0);
    Revision::new(format!("{}-{}", generation.saturating_add(1), Uuid::new_v4().simple()))
}

fn missing_database() -> StorageError {
    StorageError::Store("database does not exist".to_string())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn database_exists(&self) -> Result<bool> {
        Ok(self.docs.read().await.is_some())
    }

    async fn create_database(&self) -> Result<()> {
        let mut docs = self.docs.write().await;
        if docs.is_none() {
            *docs = Some(BTreeMap::new());
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Document> {
        let docs = self.docs.read().await;
        let docs = docs.as_ref().ok_or_else(missing_database)?;
        docs.get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn insert(&self, mut doc: Document) -> Result<Revision> {
        let mut docs = self.docs.write().await;
        let docs = docs.as_mut().ok_or_else(missing_database)?;

        let current = docs.get(&doc.id).and_then(|d| d.rev.clone());
        if current != doc.rev {
            return Err(StorageError::Conflict(doc.id));
        }

        let rev = next_revision(current.as_ref());
        doc.rev = Some(rev.clone());
        docs.insert(doc.id.clone(), doc);
        Ok(rev)
    }

    async fn query_view(&self, design: &str, view: &str, key: &Value) -> Result<Vec<ViewRow>> {
        let docs = self.docs.read().await;
        let docs = docs.as_ref().ok_or_else(missing_database)?;

        let design_id = format!("_design/{design}");
        if design != index::DESIGN_NAME || !docs.contains_key(&design_id) {
            return Err(StorageError::NotFound(design_id));
        }

        let mut rows = Vec::new();
        for doc in docs.values() {
            let emitted = index::rows_for_view(view, doc)
                .ok_or_else(|| StorageError::NotFound(format!("{design_id}/_view/{view}")))?;
            rows.extend(emitted.into_iter().filter(|row| &row.key == key));
        }
        Ok(rows)
    }
}
