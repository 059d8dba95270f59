use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::cache::LibraryCache;
use super::index::{self, FlowTree};
use super::keys::{Namespace, SingletonKind};
use super::repository::{FlowStorage, LibraryEntry};
use super::revision::RevisionTracker;
use super::seed::{self, SeedReport, SeedSources};
use crate::couch::{Document, DocumentStore, Revision};
use crate::error::{Result, StorageError};

const FLOW_LIBRARY: &str = "flow";

/// Flow, credential, settings and library storage over a document store.
///
/// Singleton documents are written with the last revision this instance
/// observed. Library entries re-fetch their current revision right before
/// each write instead.
pub struct CouchStorage {
    store: Arc<dyn DocumentStore>,
    namespace: Namespace,
    seeds: SeedSources,
    revisions: RevisionTracker,
    cache: LibraryCache,
}

impl CouchStorage {
    pub fn new(store: Arc<dyn DocumentStore>, namespace: Namespace, seeds: SeedSources) -> Self {
        Self {
            store,
            namespace,
            seeds,
            revisions: RevisionTracker::new(),
            cache: LibraryCache::new(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Make sure the database and the library design document exist, then
    /// seed defaults if this namespace has no flow document yet. Returns the
    /// seeding report when seeding was attempted.
    pub async fn initialize(&self) -> Result<Option<SeedReport>> {
        self.ensure_database().await?;
        Ok(self.prepopulate().await)
    }

    async fn ensure_database(&self) -> Result<()> {
        if !self.store.database_exists().await? {
            tracing::info!(namespace = %self.namespace, "Creating database");
            self.store.create_database().await?;
        }

        match self.store.get(index::DESIGN_DOC_ID).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::info!(id = index::DESIGN_DOC_ID, "Installing library views");
                match self.store.insert(index::design_document()).await {
                    Ok(_) => Ok(()),
                    // Installed concurrently by another instance.
                    Err(e) if e.is_conflict() => Ok(()),
                    Err(e) => Err(StorageError::Store(format!(
                        "failed to create library views: {e}"
                    ))),
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn prepopulate(&self) -> Option<SeedReport> {
        let key = self.namespace.singleton_key(SingletonKind::Flow);
        match self.store.get(&key).await {
            Ok(_) => {
                tracing::debug!(key = %key, "Flows already exist, skipping defaults");
                None
            }
            Err(e) if e.is_not_found() => Some(seed::seed_defaults(self, &self.seeds).await),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Could not check for existing flows, skipping defaults");
                None
            }
        }
    }

    async fn get_singleton(&self, kind: SingletonKind) -> Result<Value> {
        let key = self.namespace.singleton_key(kind);
        match self.store.get(&key).await {
            Ok(mut doc) => {
                if let Some(rev) = doc.rev.take() {
                    self.revisions.observe(kind, rev).await;
                }
                Ok(doc.take_field(kind.field()).unwrap_or_else(|| kind.empty_value()))
            }
            Err(e) if e.is_not_found() => Ok(kind.empty_value()),
            Err(e) => Err(e),
        }
    }

    async fn save_singleton(&self, kind: SingletonKind, value: Value) -> Result<()> {
        let key = self.namespace.singleton_key(kind);
        let doc = Document::new(key.as_str())
            .with_field(kind.field(), value)
            .with_rev(self.revisions.current(kind).await);

        match self.store.insert(doc).await {
            Ok(rev) => {
                self.revisions.observe(kind, rev).await;
                Ok(())
            }
            Err(e) => {
                if e.is_conflict() {
                    tracing::warn!(key = %key, "Revision conflict saving document");
                }
                Err(e)
            }
        }
    }

    /// Current revision of a library document, `None` if it does not exist.
    async fn existing_revision(&self, key: &str) -> Result<Option<Revision>> {
        match self.store.get(key).await {
            Ok(doc) => Ok(doc.rev),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl FlowStorage for CouchStorage {
    async fn init(&self) -> Result<()> {
        self.initialize().await.map(|_| ())
    }

    async fn get_flows(&self) -> Result<Value> {
        self.get_singleton(SingletonKind::Flow).await
    }

    async fn save_flows(&self, flows: Value) -> Result<()> {
        self.save_singleton(SingletonKind::Flow, flows).await
    }

    async fn get_credentials(&self) -> Result<Value> {
        self.get_singleton(SingletonKind::Credentials).await
    }

    async fn save_credentials(&self, credentials: Value) -> Result<()> {
        self.save_singleton(SingletonKind::Credentials, credentials).await
    }

    async fn get_settings(&self) -> Result<Value> {
        self.get_singleton(SingletonKind::Settings).await
    }

    async fn save_settings(&self, settings: Value) -> Result<()> {
        self.save_singleton(SingletonKind::Settings, settings).await
    }

    async fn get_all_flows(&self) -> Result<FlowTree> {
        index::list_all(self.store.as_ref(), &self.namespace).await
    }

    async fn get_flow(&self, path: &str) -> Result<Value> {
        let key = self.namespace.library_key(FLOW_LIBRARY, path);
        let mut doc = self.store.get(&key).await?;
        Ok(doc.take_field("data").unwrap_or(Value::Null))
    }

    async fn save_flow(&self, path: &str, data: Value) -> Result<()> {
        let key = self.namespace.library_key(FLOW_LIBRARY, path);
        let rev = self.existing_revision(&key).await?;
        let doc = Document::new(key.as_str()).with_field("data", data).with_rev(rev);
        self.store.insert(doc).await?;

        self.cache
            .invalidate_ancestors(&self.namespace, FLOW_LIBRARY, path)
            .await;
        self.cache.remove(&key).await;
        Ok(())
    }

    async fn get_library_entry(&self, lib_type: &str, path: &str) -> Result<LibraryEntry> {
        let key = self.namespace.library_key(lib_type, path);
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(key = %key, "Library cache hit");
            return Ok(hit);
        }

        let generation = self.cache.generation().await;
        let entry = match self.store.get(&key).await {
            Ok(mut doc) => LibraryEntry::Body(doc.take_field("body").unwrap_or(Value::Null)),
            Err(e) if e.is_not_found() => LibraryEntry::Listing(
                index::list_directory(self.store.as_ref(), &self.namespace, lib_type, path).await?,
            ),
            Err(e) => return Err(e),
        };

        self.cache
            .insert_if_unchanged(key, entry.clone(), generation)
            .await;
        Ok(entry)
    }

    async fn save_library_entry(
        &self,
        lib_type: &str,
        path: &str,
        meta: Value,
        body: Value,
    ) -> Result<()> {
        let key = self.namespace.library_key(lib_type, path);
        let rev = self.existing_revision(&key).await?;
        let doc = Document::new(key.as_str())
            .with_field("meta", meta)
            .with_field("body", body.clone())
            .with_rev(rev);
        self.store.insert(doc).await?;

        self.cache
            .invalidate_ancestors(&self.namespace, lib_type, path)
            .await;
        self.cache.insert(key, LibraryEntry::Body(body)).await;
        Ok(())
    }
}
