/// Errors from storage operations.
///
/// `NotFound` is absorbed into a default value by singleton reads and
/// propagated everywhere else. `Conflict` means the revision presented on a
/// write was stale; it is never retried internally. `Seed` failures are only
/// ever logged by the bootstrap path.
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("revision conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("seed failed: {0}")]
    Seed(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_key() {
        let err = StorageError::NotFound("host/flow".into());
        assert_eq!(err.to_string(), "document not found: host/flow");
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn conflict_is_distinct_from_store() {
        let err = StorageError::Conflict("host/settings".into());
        assert!(err.is_conflict());
        assert!(!StorageError::Store("boom".into()).is_conflict());
    }

    #[test]
    fn serde_error_converts_via_from() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: StorageError = serde_err.into();
        assert!(matches!(err, StorageError::Serde(_)));
        assert!(err.to_string().starts_with("serialization: "));
    }

    #[test]
    fn store_and_seed_display() {
        assert_eq!(
            StorageError::Store("500 Internal Server Error".into()).to_string(),
            "store error: 500 Internal Server Error"
        );
        assert_eq!(
            StorageError::Seed("defaults/flow.json missing".into()).to_string(),
            "seed failed: defaults/flow.json missing"
        );
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StorageError>();
    }
}
