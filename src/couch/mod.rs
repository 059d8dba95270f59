pub mod http;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Opaque revision token assigned by the store on every successful write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(String);

impl Revision {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document as the store sees it: `_id`, optional `_rev`, and arbitrary
/// top-level fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<Revision>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rev: None,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Attach the write precondition, if one is known.
    pub fn with_rev(mut self, rev: Option<Revision>) -> Self {
        self.rev = rev;
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn take_field(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }
}

/// One row of a secondary-index query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRow {
    #[serde(default)]
    pub id: Option<String>,
    pub key: Value,
    pub value: Value,
}

/// The backing document store. Implementations must report a missing
/// document as `StorageError::NotFound` and a stale or missing revision on
/// insert as `StorageError::Conflict`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn database_exists(&self) -> Result<bool>;
    async fn create_database(&self) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Document>;
    async fn insert(&self, doc: Document) -> Result<Revision>;
    /// Rows whose key equals `key`, ordered by key then document id.
    async fn query_view(&self, design: &str, view: &str, key: &Value) -> Result<Vec<ViewRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_serializes_couch_fields() {
        let doc = Document::new("host/settings")
            .with_field("settings", json!({"theme": "dark"}))
            .with_rev(Some(Revision::new("1-abc")));

        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            value,
            json!({"_id": "host/settings", "_rev": "1-abc", "settings": {"theme": "dark"}})
        );
    }

    #[test]
    fn document_without_rev_omits_it() {
        let doc = Document::new("host/flow").with_field("flow", json!([]));
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("_rev").is_none());
    }

    #[test]
    fn document_parses_store_response() {
        let doc: Document = serde_json::from_value(json!({
            "_id": "host/lib/functions/a/b",
            "_rev": "3-ff",
            "meta": {"name": "b"},
            "body": "return msg;"
        }))
        .unwrap();
        assert_eq!(doc.rev, Some(Revision::new("3-ff")));
        assert_eq!(doc.field("body"), Some(&json!("return msg;")));
        assert!(doc.field("_id").is_none());
    }
}
