//! The operations the move job needs from a cluster.
//!
//! [`crate::es::EsClusterClient`] implements them over HTTP; tests swap in an
//! in-memory cluster.
use crate::error::Result;
use crate::inventory::IndexDescriptor;
use crate::snapshot::SnapshotDescriptor;
use async_trait::async_trait;

#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Address of the cluster, for progress output and errors.
    fn url(&self) -> &str;

    /// Every index with its creation date and doc count.
    async fn list_indices(&self) -> Result<Vec<IndexDescriptor>>;

    /// All snapshots in `repository`, running ones included.
    ///
    /// # Errors
    ///
    /// `RepositoryNotFound` if the repository is not registered.
    async fn list_snapshots(
        &self, repository: &str,
    ) -> Result<Vec<SnapshotDescriptor>>;

    /// Manifest of one snapshot.
    ///
    /// # Errors
    ///
    /// `RepositoryNotFound` or `SnapshotNotFound`.
    async fn get_snapshot(
        &self, repository: &str, snapshot: &str,
    ) -> Result<SnapshotDescriptor>;

    /// Number of snapshots currently running anywhere in the cluster.
    async fn running_snapshots(&self) -> Result<usize>;

    /// Start a snapshot of `indices`. Returns once the cluster accepted it;
    /// poll [`ClusterClient::get_snapshot`] for completion.
    async fn create_snapshot(
        &self, repository: &str, snapshot: &str, indices: &[String],
    ) -> Result<()>;

    /// Restore `indices` from `snapshot` and wait until the restore is done.
    async fn restore_snapshot(
        &self, repository: &str, snapshot: &str, indices: &[String],
    ) -> Result<()>;

    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Doc count of `index`, `None` if the cluster has no such index.
    async fn count_documents(&self, index: &str) -> Result<Option<u64>>;
}
