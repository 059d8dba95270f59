//! Secondary indexes that expose the flat library key space as a tree.
//!
//! Library documents are keyed `<ns>/lib/<type>/<a>/<b>/<name>`. The store
//! maintains two views over them:
//!
//! - `flow_entries_by_app_and_type` emits `[ns, "flow"] -> {path}` for every
//!   document of the `flow` type.
//! - `lib_entries_by_app_and_type` emits, for every other type, one
//!   `[ns, type, prefix] -> {dir}` row per ancestor directory plus a final
//!   `[ns, type, dir] -> {...meta, fn}` row for the entry itself.
//!
//! Querying the second view with `[ns, type, "a/b"]` therefore returns exactly
//! the immediate children of `/a/b`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::keys::{Namespace, index_path};
use crate::couch::{Document, DocumentStore, ViewRow};
use crate::error::Result;

pub const DESIGN_NAME: &str = "library";
pub const DESIGN_DOC_ID: &str = "_design/library";
pub const FLOW_ENTRIES_VIEW: &str = "flow_entries_by_app_and_type";
pub const LIB_ENTRIES_VIEW: &str = "lib_entries_by_app_and_type";

const FLOW_TYPE: &str = "flow";

const FLOW_ENTRIES_MAP: &str = r#"function(doc) {
  var p = doc._id.split('/');
  if (p.length > 3 && p[1] == 'lib' && p[2] == 'flow') {
    emit([p[0], p[2]], {path: p.slice(3).join('/')});
  }
}"#;

const LIB_ENTRIES_MAP: &str = r#"function(doc) {
  var p = doc._id.split('/');
  if (p.length > 3 && p[1] == 'lib' && p[2] != 'flow') {
    var pathParts = p.slice(3, -1);
    for (var i = 0; i < pathParts.length; i++) {
      emit([p[0], p[2], pathParts.slice(0, i).join('/')], {dir: pathParts[i]});
    }
    var meta = {};
    for (var key in doc.meta) {
      meta[key] = doc.meta[key];
    }
    meta.fn = p[p.length - 1];
    emit([p[0], p[2], pathParts.join('/')], meta);
  }
}"#;

/// The design document installed when the database is created.
pub fn design_document() -> Document {
    let mut views = Map::new();
    views.insert(FLOW_ENTRIES_VIEW.to_string(), json!({ "map": FLOW_ENTRIES_MAP }));
    views.insert(LIB_ENTRIES_VIEW.to_string(), json!({ "map": LIB_ENTRIES_MAP }));
    Document::new(DESIGN_DOC_ID).with_field("views", Value::Object(views))
}

/// Splits a library document id into `(namespace, type, path segments)`.
fn library_parts(id: &str) -> Option<(&str, &str, Vec<&str>)> {
    let parts: Vec<&str> = id.split('/').collect();
    if parts.len() <= 3 || parts[1] != "lib" {
        return None;
    }
    Some((parts[0], parts[2], parts[3..].to_vec()))
}

/// Rows the flow-entries view emits for `doc`.
pub fn flow_entry_rows(doc: &Document) -> Vec<ViewRow> {
    match library_parts(&doc.id) {
        Some((ns, FLOW_TYPE, segments)) => vec![ViewRow {
            id: Some(doc.id.clone()),
            key: json!([ns, FLOW_TYPE]),
            value: json!({ "path": segments.join("/") }),
        }],
        _ => Vec::new(),
    }
}

/// Rows the library-entries view emits for `doc`.
pub fn library_entry_rows(doc: &Document) -> Vec<ViewRow> {
    let Some((ns, lib_type, segments)) = library_parts(&doc.id) else {
        return Vec::new();
    };
    if lib_type == FLOW_TYPE {
        return Vec::new();
    }

    let (file_name, dir_parts) = match segments.split_last() {
        Some(split) => split,
        None => return Vec::new(),
    };

    let mut rows: Vec<ViewRow> = dir_parts
        .iter()
        .enumerate()
        .map(|(depth, dir)| ViewRow {
            id: Some(doc.id.clone()),
            key: json!([ns, lib_type, dir_parts[..depth].join("/")]),
            value: json!({ "dir": dir }),
        })
        .collect();

    let mut meta: Map<String, Value> = doc
        .field("meta")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    meta.insert("fn".to_string(), Value::String(file_name.to_string()));
    rows.push(ViewRow {
        id: Some(doc.id.clone()),
        key: json!([ns, lib_type, dir_parts.join("/")]),
        value: Value::Object(meta),
    });

    rows
}

/// Evaluate a view of the `library` design document against one document.
/// Returns `None` for unknown views.
pub fn rows_for_view(view: &str, doc: &Document) -> Option<Vec<ViewRow>> {
    match view {
        FLOW_ENTRIES_VIEW => Some(flow_entry_rows(doc)),
        LIB_ENTRIES_VIEW => Some(library_entry_rows(doc)),
        _ => None,
    }
}

/// Nested enumeration of flow snapshots: `d` maps directory names to
/// subtrees, `f` lists the file names at this level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowTree {
    #[serde(rename = "d", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dirs: BTreeMap<String, FlowTree>,
    #[serde(rename = "f", default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl FlowTree {
    fn insert_path(&mut self, path: &str) {
        let mut parts: Vec<&str> = path.split('/').collect();
        let Some(file) = parts.pop() else {
            return;
        };
        let mut node = self;
        for dir in parts {
            node = node.dirs.entry(dir.to_string()).or_default();
        }
        node.files.push(file.to_string());
    }
}

/// One-level listing under a library path. Directory names are unique in
/// first-seen order; file records keep the index's order and duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryListing {
    pub dirs: Vec<String>,
    pub files: Vec<Value>,
}

impl DirectoryListing {
    fn push_dir(&mut self, name: &str) {
        if !self.dirs.iter().any(|d| d == name) {
            self.dirs.push(name.to_string());
        }
    }

    /// Split library-entries rows into directories and file records.
    pub fn from_rows(rows: Vec<ViewRow>) -> Self {
        let mut listing = DirectoryListing::default();
        for row in rows {
            match row.value.get("dir").and_then(Value::as_str) {
                Some(dir) => listing.push_dir(dir),
                None => listing.files.push(row.value),
            }
        }
        listing
    }

    /// Build the listing of `dir` (root-relative) from flow-entries rows.
    pub fn from_flow_rows(rows: &[ViewRow], dir: &str) -> Self {
        let mut listing = DirectoryListing::default();
        for row in rows {
            let Some(path) = row.value.get("path").and_then(Value::as_str) else {
                continue;
            };
            let (parent, name) = path.rsplit_once('/').unwrap_or(("", path));
            if parent == dir {
                listing.files.push(json!({ "fn": name }));
                continue;
            }
            let below = if dir.is_empty() {
                Some(path)
            } else {
                path.strip_prefix(dir).and_then(|rest| rest.strip_prefix('/'))
            };
            if let Some(child) = below.and_then(|rest| rest.split('/').next()) {
                listing.push_dir(child);
            }
        }
        listing
    }
}

/// Every flow snapshot in the namespace, folded into a tree.
pub async fn list_all(store: &dyn DocumentStore, ns: &Namespace) -> Result<FlowTree> {
    let rows = store
        .query_view(DESIGN_NAME, FLOW_ENTRIES_VIEW, &json!([ns.as_str(), FLOW_TYPE]))
        .await?;

    let mut tree = FlowTree::default();
    for row in &rows {
        if let Some(path) = row.value.get("path").and_then(Value::as_str) {
            tree.insert_path(path);
        }
    }
    Ok(tree)
}

/// The immediate children of `path` for the given library type.
pub async fn list_directory(
    store: &dyn DocumentStore,
    ns: &Namespace,
    lib_type: &str,
    path: &str,
) -> Result<DirectoryListing> {
    let dir = index_path(path);

    if lib_type == FLOW_TYPE {
        let rows = store
            .query_view(DESIGN_NAME, FLOW_ENTRIES_VIEW, &json!([ns.as_str(), FLOW_TYPE]))
            .await?;
        return Ok(DirectoryListing::from_flow_rows(&rows, &dir));
    }

    let rows = store
        .query_view(DESIGN_NAME, LIB_ENTRIES_VIEW, &json!([ns.as_str(), lib_type, dir]))
        .await?;
    Ok(DirectoryListing::from_rows(rows))
}
