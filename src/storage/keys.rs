use std::fmt;

use serde_json::{Value, json};

const LIBRARY_SEGMENT: &str = "lib";

/// The three documents that exist at most once per namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SingletonKind {
    Flow,
    Credentials,
    Settings,
}

impl SingletonKind {
    /// Key segment after the namespace.
    pub fn key_segment(self) -> &'static str {
        match self {
            SingletonKind::Flow => "flow",
            SingletonKind::Credentials => "credential",
            SingletonKind::Settings => "settings",
        }
    }

    /// Document field holding the payload.
    pub fn field(self) -> &'static str {
        match self {
            SingletonKind::Flow => "flow",
            SingletonKind::Credentials => "credentials",
            SingletonKind::Settings => "settings",
        }
    }

    /// Value returned when the document does not exist yet.
    pub fn empty_value(self) -> Value {
        match self {
            SingletonKind::Flow => json!([]),
            SingletonKind::Credentials | SingletonKind::Settings => json!({}),
        }
    }
}

impl fmt::Display for SingletonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_segment())
    }
}

/// Prefix isolating one deployment's documents inside a shared database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<namespace>/<kind>`
    pub fn singleton_key(&self, kind: SingletonKind) -> String {
        format!("{}/{}", self.0, kind.key_segment())
    }

    /// `<namespace>/lib/<type><normalized path>`
    pub fn library_key(&self, lib_type: &str, path: &str) -> String {
        format!(
            "{}/{LIBRARY_SEGMENT}/{lib_type}{}",
            self.0,
            normalize_path(path)
        )
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve `path` against `/`: empty and `.` segments are dropped, `..`
/// climbs but never above the root. The result always starts with `/` and
/// never ends with one, except for the root itself.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Root-relative form used as the path component of index keys: `""` for the
/// root, `"a/b"` for `/a/b/`.
pub fn index_path(path: &str) -> String {
    let normalized = normalize_path(path);
    normalized
        .trim_start_matches('/')
        .trim_end_matches('/')
        .to_string()
}

/// Every proper ancestor of `path`, root first: `/a/b/c` yields `/`, `/a`,
/// `/a/b`. The root has no ancestors.
pub fn ancestor_paths(path: &str) -> Vec<String> {
    let normalized = normalize_path(path);
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    (0..segments.len())
        .map(|depth| format!("/{}", segments[..depth].join("/")))
        .collect()
}
