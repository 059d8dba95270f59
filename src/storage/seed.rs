use std::path::{Path, PathBuf};

use serde_json::Value;

use super::repository::FlowStorage;
use crate::error::{Result, StorageError};

/// Where default payloads are read from on first initialization.
#[derive(Debug, Clone, Default)]
pub struct SeedSources {
    pub flow: Option<PathBuf>,
    pub credentials: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedStatus {
    Installed,
    /// No source configured, or the source does not exist.
    Missing,
    Failed(String),
}

/// Independent outcome of each seeding attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub flow: SeedStatus,
    pub credentials: SeedStatus,
}

/// Read and parse a JSON seed payload. `Ok(None)` when the file is absent.
pub async fn load_seed(path: &Path) -> Result<Option<Value>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::Seed(format!(
                "failed to read {}: {e}",
                path.display()
            )));
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| StorageError::Seed(format!("failed to parse {}: {e}", path.display())))
}

async fn seed_one<F, Fut>(what: &str, source: Option<&Path>, save: F) -> SeedStatus
where
    F: FnOnce(Value) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    let Some(path) = source else {
        tracing::info!(what, "No default source configured");
        return SeedStatus::Missing;
    };

    let payload = match load_seed(path).await {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            tracing::info!(what, path = %path.display(), "No default found");
            return SeedStatus::Missing;
        }
        Err(e) => {
            tracing::warn!(what, error = %e, "Failed to load default");
            return SeedStatus::Failed(e.to_string());
        }
    };

    tracing::info!(what, path = %path.display(), "Installing default");
    match save(payload).await {
        Ok(()) => SeedStatus::Installed,
        Err(e) => {
            tracing::warn!(what, error = %e, "Failed to save default");
            SeedStatus::Failed(e.to_string())
        }
    }
}

/// Install the default flow graph and credentials. Both attempts run
/// concurrently and neither failure affects the other; failures are logged
/// and reported, never returned as errors.
pub async fn seed_defaults(storage: &dyn FlowStorage, sources: &SeedSources) -> SeedReport {
    let (flow, credentials) = tokio::join!(
        seed_one("flow", sources.flow.as_deref(), |v| storage.save_flows(v)),
        seed_one("credentials", sources.credentials.as_deref(), |v| storage
            .save_credentials(v)),
    );
    SeedReport { flow, credentials }
}
