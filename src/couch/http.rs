use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{Document, DocumentStore, Revision, ViewRow};
use crate::error::{Result, StorageError};

const DESIGN_PREFIX: &str = "_design/";

const DOC_ID: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

#[derive(Deserialize)]
struct InsertResponse {
    rev: Revision,
}

#[derive(Deserialize)]
struct ViewResponse {
    #[serde(default)]
    rows: Vec<ViewRow>,
}

/// CouchDB over HTTP, bound to a single database.
pub struct HttpDocumentStore {
    client: Client,
    base_url: String,
    db: String,
}

impl HttpDocumentStore {
    pub fn new(client: Client, base_url: &str, db: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            db: db.to_string(),
        }
    }

    fn db_url(&self) -> String {
        format!("{}/{}", self.base_url, utf8_percent_encode(&self.db, DOC_ID))
    }

    fn doc_url(&self, id: &str) -> String {
        format!("{}/{}", self.db_url(), encode_doc_id(id))
    }
}

/// Document ids contain `/`, which must be escaped, except the separator in
/// design document ids.
fn encode_doc_id(id: &str) -> String {
    match id.strip_prefix(DESIGN_PREFIX) {
        Some(rest) => format!("{DESIGN_PREFIX}{}", utf8_percent_encode(rest, DOC_ID)),
        None => utf8_percent_encode(id, DOC_ID).to_string(),
    }
}

async fn store_error(resp: Response, action: &str) -> StorageError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    StorageError::Store(format!("CouchDB error {status} {action}: {body}"))
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn database_exists(&self) -> Result<bool> {
        let resp = self.client.get(self.db_url()).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(store_error(resp, &format!("checking database {}", self.db)).await),
        }
    }

    async fn create_database(&self) -> Result<()> {
        let resp = self.client.put(self.db_url()).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            // Another process created it first.
            StatusCode::PRECONDITION_FAILED => Ok(()),
            _ => Err(store_error(resp, &format!("creating database {}", self.db)).await),
        }
    }

    async fn get(&self, id: &str) -> Result<Document> {
        let resp = self.client.get(self.doc_url(id)).send().await?;
        match resp.status() {
            s if s.is_success() => Ok(resp.json().await?),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(id.to_string())),
            _ => Err(store_error(resp, &format!("fetching {id}")).await),
        }
    }

    async fn insert(&self, doc: Document) -> Result<Revision> {
        let resp = self.client.post(self.db_url()).json(&doc).send().await?;
        match resp.status() {
            s if s.is_success() => {
                let body: InsertResponse = resp.json().await?;
                Ok(body.rev)
            }
            StatusCode::CONFLICT => Err(StorageError::Conflict(doc.id)),
            _ => Err(store_error(resp, &format!("writing {}", doc.id)).await),
        }
    }

    async fn query_view(&self, design: &str, view: &str, key: &Value) -> Result<Vec<ViewRow>> {
        let url = format!(
            "{}/{DESIGN_PREFIX}{}/_view/{}",
            self.db_url(),
            utf8_percent_encode(design, DOC_ID),
            utf8_percent_encode(view, DOC_ID)
        );
        let key = serde_json::to_string(key)?;
        let resp = self
            .client
            .get(&url)
            .query(&[("key", key.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(store_error(resp, &format!("querying view {design}/{view}")).await);
        }

        let body: ViewResponse = resp.json().await?;
        Ok(body.rows)
    }
}
