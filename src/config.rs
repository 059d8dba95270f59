use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::couch::http::HttpDocumentStore;
use crate::storage::{CouchStorage, Namespace, SeedSources};

const DEFAULT_COUCH_URL: &str = "http://127.0.0.1:5984";
const DEFAULT_DATABASE: &str = "nodered";
const DEFAULT_SEED_FLOW: &str = "defaults/flow.json";
const DEFAULT_SEED_CREDENTIALS: &str = "defaults/flow_cred.json";

/// Storage configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub couch_url: String,
    pub database: String,
    pub namespace: Namespace,
    pub seeds: SeedSources,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub sentry_dsn: Option<String>,
    pub environment: String,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build a config from a variable lookup. Used directly in tests to avoid
    /// mutating process-global environment. Empty values count as unset.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let secs = |name: &str, default: u64| {
            var(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let namespace = var("COUCH_APPNAME")
            .or_else(|| var("HOSTNAME"))
            .or_else(read_hostname)
            .unwrap_or_else(|| "localhost".to_string());

        StorageConfig {
            couch_url: var("COUCH_URL").unwrap_or_else(|| DEFAULT_COUCH_URL.to_string()),
            database: var("COUCH_DB").unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            namespace: Namespace::new(namespace),
            seeds: SeedSources {
                flow: Some(PathBuf::from(
                    var("COUCH_SEED_FLOW").unwrap_or_else(|| DEFAULT_SEED_FLOW.to_string()),
                )),
                credentials: Some(PathBuf::from(
                    var("COUCH_SEED_CREDENTIALS")
                        .unwrap_or_else(|| DEFAULT_SEED_CREDENTIALS.to_string()),
                )),
            },
            connect_timeout: Duration::from_secs(secs("COUCH_CONNECT_TIMEOUT_SECS", 10)),
            request_timeout: Duration::from_secs(secs("COUCH_TIMEOUT_SECS", 30)),
            sentry_dsn: var("SENTRY_DSN"),
            environment: var("ENVIRONMENT").unwrap_or_else(|| "local".to_string()),
        }
    }

    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
            .context("failed to build HTTP client")
    }

    /// A CouchDB-backed storage adapter. Call `init` before use.
    pub fn storage(&self) -> Result<CouchStorage> {
        let store = HttpDocumentStore::new(self.http_client()?, &self.couch_url, &self.database);
        Ok(CouchStorage::new(
            Arc::new(store),
            self.namespace.clone(),
            self.seeds.clone(),
        ))
    }
}

fn read_hostname() -> Option<String> {
    std::fs::read_to_string("/etc/hostname")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
