use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::index::{DirectoryListing, FlowTree};
use crate::error::Result;

/// What a library path resolves to: the stored body of a leaf entry, or the
/// synthesized listing of a directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LibraryEntry {
    Body(Value),
    Listing(DirectoryListing),
}

impl LibraryEntry {
    pub fn as_listing(&self) -> Option<&DirectoryListing> {
        match self {
            LibraryEntry::Listing(listing) => Some(listing),
            LibraryEntry::Body(_) => None,
        }
    }

    pub fn as_body(&self) -> Option<&Value> {
        match self {
            LibraryEntry::Body(body) => Some(body),
            LibraryEntry::Listing(_) => None,
        }
    }
}

/// Storage surface consumed by the flow runtime and the library browser.
#[async_trait]
pub trait FlowStorage: Send + Sync {
    // Lifecycle
    async fn init(&self) -> Result<()>;

    // Flow graph
    async fn get_flows(&self) -> Result<Value>;
    async fn save_flows(&self, flows: Value) -> Result<()>;

    // Credentials
    async fn get_credentials(&self) -> Result<Value>;
    async fn save_credentials(&self, credentials: Value) -> Result<()>;

    // Settings
    async fn get_settings(&self) -> Result<Value>;
    async fn save_settings(&self, settings: Value) -> Result<()>;

    // Flow snapshots
    async fn get_all_flows(&self) -> Result<FlowTree>;
    async fn get_flow(&self, path: &str) -> Result<Value>;
    async fn save_flow(&self, path: &str, data: Value) -> Result<()>;

    // Library
    async fn get_library_entry(&self, lib_type: &str, path: &str) -> Result<LibraryEntry>;
    async fn save_library_entry(
        &self,
        lib_type: &str,
        path: &str,
        meta: Value,
        body: Value,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entries_serialize_untagged() {
        let body = LibraryEntry::Body(json!("return msg;"));
        assert_eq!(serde_json::to_value(&body).unwrap(), json!("return msg;"));

        let listing = LibraryEntry::Listing(DirectoryListing {
            dirs: vec!["b".into()],
            files: vec![json!({"fn": "x"})],
        });
        assert_eq!(
            serde_json::to_value(&listing).unwrap(),
            json!({"dirs": ["b"], "files": [{"fn": "x"}]})
        );
        assert!(listing.as_body().is_none());
        assert_eq!(listing.as_listing().unwrap().dirs, vec!["b"]);
    }
}
