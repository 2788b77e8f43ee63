use crate::client::ClusterClient;
use crate::error::{MoveError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotState {
    InProgress,
    Success,
    Failed,
    Partial,
    Incompatible,
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SnapshotState::InProgress => "IN_PROGRESS",
            SnapshotState::Success => "SUCCESS",
            SnapshotState::Failed => "FAILED",
            SnapshotState::Partial => "PARTIAL",
            SnapshotState::Incompatible => "INCOMPATIBLE",
        };
        f.write_str(s)
    }
}

/// One entry of the `_snapshot` api response:
///
/// ```json
/// {
///   "snapshot" : "logstash-2021.05.11",
///   "uuid" : "BAtz3c9lTlud4Qn__HeqWA",
///   "indices" : [ "logstash-2021.05.11" ],
///   "state" : "SUCCESS",
///   "start_time_in_millis" : 1621736278280,
///   "end_time_in_millis" : 1621737471199,
///   ...
/// }
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDescriptor {
    #[serde(rename(deserialize = "snapshot"))]
    pub name: String,
    pub state: SnapshotState,
    #[serde(default)]
    pub indices: Vec<String>,
    #[serde(
        default,
        rename(deserialize = "start_time_in_millis"),
        with = "crate::date::optional_millis"
    )]
    pub start_time: Option<DateTime<Utc>>,
    /// `None` while the snapshot is still running.
    #[serde(
        default,
        rename(deserialize = "end_time_in_millis"),
        with = "crate::date::optional_millis"
    )]
    pub end_time: Option<DateTime<Utc>>,
}

impl SnapshotDescriptor {
    pub fn contains(&self, index: &str) -> bool {
        self.indices.iter().any(|i| i == index)
    }
}

fn latest<'a, I>(snapshots: I) -> Option<&'a SnapshotDescriptor>
where
    I: Iterator<Item = &'a SnapshotDescriptor>,
{
    snapshots
        .filter_map(|s| s.end_time.map(|end| (end, s)))
        .max_by(|(a_end, a), (b_end, b)| {
            a_end.cmp(b_end).then_with(|| a.name.cmp(&b.name))
        })
        .map(|(_, s)| s)
}

/// Latest completed snapshot; equal completion times go to the greater name.
pub fn most_recent(
    snapshots: &[SnapshotDescriptor],
) -> Option<&SnapshotDescriptor> {
    latest(snapshots.iter())
}

/// Most recent successful snapshot that captured `index`.
pub fn covering_snapshot<'a>(
    snapshots: &'a [SnapshotDescriptor], index: &str,
) -> Option<&'a SnapshotDescriptor> {
    latest(
        snapshots
            .iter()
            .filter(|s| s.state == SnapshotState::Success && s.contains(index)),
    )
}

pub async fn most_recent_snapshot<C>(
    client: &C, repository: &str,
) -> Result<SnapshotDescriptor>
where
    C: ClusterClient + ?Sized,
{
    let snapshots = client.list_snapshots(repository).await?;
    log::debug!("{} snapshots in repository {}", snapshots.len(), repository);
    most_recent(&snapshots)
        .cloned()
        .ok_or_else(|| MoveError::NoSnapshots(repository.to_string()))
}

/// Indices captured by `snapshot`, in manifest order.
pub async fn indices_of<C>(
    client: &C, repository: &str, snapshot: &str,
) -> Result<Vec<String>>
where
    C: ClusterClient + ?Sized,
{
    let snapshot = client.get_snapshot(repository, snapshot).await?;
    Ok(snapshot.indices)
}
