use std::collections::HashMap;

use tokio::sync::RwLock;

use super::keys::SingletonKind;
use crate::couch::Revision;

/// Last revision this adapter observed for each singleton document.
///
/// One slot per kind, shared by every caller of the adapter. Concurrent saves
/// of the same kind can interleave between reading the slot and recording the
/// new token; callers serialize writes per kind if that matters.
#[derive(Default)]
pub struct RevisionTracker {
    slots: RwLock<HashMap<SingletonKind, Revision>>,
}

impl RevisionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn observe(&self, kind: SingletonKind, rev: Revision) {
        tracing::debug!(%kind, rev = %rev, "Observed revision");
        self.slots.write().await.insert(kind, rev);
    }

    pub async fn current(&self, kind: SingletonKind) -> Option<Revision> {
        self.slots.read().await.get(&kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_until_observed() {
        let tracker = RevisionTracker::new();
        assert!(tracker.current(SingletonKind::Flow).await.is_none());
    }

    #[tokio::test]
    async fn latest_observation_wins() {
        let tracker = RevisionTracker::new();
        tracker.observe(SingletonKind::Settings, Revision::new("1-a")).await;
        tracker.observe(SingletonKind::Settings, Revision::new("2-b")).await;
        assert_eq!(
            tracker.current(SingletonKind::Settings).await,
            Some(Revision::new("2-b"))
        );
    }

    #[tokio::test]
    async fn kinds_are_tracked_independently() {
        let tracker = RevisionTracker::new();
        tracker.observe(SingletonKind::Flow, Revision::new("1-f")).await;
        assert!(tracker.current(SingletonKind::Credentials).await.is_none());
        assert!(tracker.current(SingletonKind::Settings).await.is_none());
    }
}
