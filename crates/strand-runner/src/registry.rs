//! In-memory registries of currently running workers.
//!
//! The two maps are the only shared mutable state between the tick loop and
//! the worker tasks. They are disjoint by construction: a download id lives
//! in at most one of them at any instant, and the tick loop alone inserts
//! and removes entries.

use std::collections::HashMap;
use std::sync::Arc;

use strand_core::{DownloadHandle, UnpackHandle};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Owner object for the download- and unpack-worker maps.
///
/// Iteration works on a cloned snapshot, so sweeping can remove entries
/// while worker tasks keep inserting progress behind the same `Arc`s.
#[derive(Default)]
pub struct ActiveRegistry {
    downloads: RwLock<HashMap<Uuid, Arc<dyn DownloadHandle>>>,
    unpacks: RwLock<HashMap<Uuid, Arc<dyn UnpackHandle>>>,
}

impl ActiveRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently registered download workers.
    pub async fn download_count(&self) -> usize {
        self.downloads.read().await.len()
    }

    /// Number of currently registered unpack workers.
    pub async fn unpack_count(&self) -> usize {
        self.unpacks.read().await.len()
    }

    /// Whether a download worker is registered under the id.
    pub async fn contains_download(&self, download_id: Uuid) -> bool {
        self.downloads.read().await.contains_key(&download_id)
    }

    /// Whether an unpack worker is registered under the id.
    pub async fn contains_unpack(&self, download_id: Uuid) -> bool {
        self.unpacks.read().await.contains_key(&download_id)
    }

    /// Register a download worker.
    pub async fn insert_download(&self, download_id: Uuid, worker: Arc<dyn DownloadHandle>) {
        self.downloads.write().await.insert(download_id, worker);
    }

    /// Register an unpack worker.
    pub async fn insert_unpack(&self, download_id: Uuid, worker: Arc<dyn UnpackHandle>) {
        self.unpacks.write().await.insert(download_id, worker);
    }

    /// Remove a download worker.
    pub async fn remove_download(&self, download_id: Uuid) {
        self.downloads.write().await.remove(&download_id);
    }

    /// Remove an unpack worker.
    pub async fn remove_unpack(&self, download_id: Uuid) {
        self.unpacks.write().await.remove(&download_id);
    }

    /// Look up the download worker registered under the id.
    pub async fn download(&self, download_id: Uuid) -> Option<Arc<dyn DownloadHandle>> {
        self.downloads.read().await.get(&download_id).cloned()
    }

    /// Consistent snapshot of the download-worker map.
    pub async fn snapshot_downloads(&self) -> Vec<(Uuid, Arc<dyn DownloadHandle>)> {
        self.downloads
            .read()
            .await
            .iter()
            .map(|(id, worker)| (*id, Arc::clone(worker)))
            .collect()
    }

    /// Consistent snapshot of the unpack-worker map.
    pub async fn snapshot_unpacks(&self) -> Vec<(Uuid, Arc<dyn UnpackHandle>)> {
        self.unpacks
            .read()
            .await
            .iter()
            .map(|(id, worker)| (*id, Arc::clone(worker)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use strand_core::DownloadClientKind;

    struct IdleDownload;

    #[async_trait]
    impl DownloadHandle for IdleDownload {
        fn kind(&self) -> DownloadClientKind {
            DownloadClientKind::Internal
        }

        fn finished(&self) -> bool {
            false
        }

        fn error(&self) -> Option<String> {
            None
        }

        fn bytes_total(&self) -> u64 {
            0
        }

        fn bytes_done(&self) -> u64 {
            0
        }

        async fn start(&self) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    struct IdleUnpack;

    #[async_trait]
    impl UnpackHandle for IdleUnpack {
        fn finished(&self) -> bool {
            false
        }

        fn error(&self) -> Option<String> {
            None
        }

        async fn start(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn maps_are_disjoint_by_construction() {
        let registry = ActiveRegistry::new();
        let id = Uuid::from_u128(1);

        registry.insert_download(id, Arc::new(IdleDownload)).await;
        assert!(registry.contains_download(id).await);
        assert!(!registry.contains_unpack(id).await);
        assert_eq!(registry.download_count().await, 1);

        registry.remove_download(id).await;
        registry.insert_unpack(id, Arc::new(IdleUnpack)).await;
        assert!(!registry.contains_download(id).await);
        assert!(registry.contains_unpack(id).await);
        assert_eq!(registry.unpack_count().await, 1);
    }

    #[tokio::test]
    async fn snapshot_tolerates_concurrent_removal() {
        let registry = Arc::new(ActiveRegistry::new());
        for index in 0..4_u128 {
            registry
                .insert_download(Uuid::from_u128(index), Arc::new(IdleDownload))
                .await;
        }

        let snapshot = registry.snapshot_downloads().await;
        for (id, _) in &snapshot {
            registry.remove_download(*id).await;
        }

        assert_eq!(snapshot.len(), 4);
        assert_eq!(registry.download_count().await, 0);
    }
}
