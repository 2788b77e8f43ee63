//! In-memory clusters sharing a snapshot repository, for driving the move job
//! without a running elasticsearch.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use elasticsearch_snapmove::client::ClusterClient;
use elasticsearch_snapmove::inventory::IndexDescriptor;
use elasticsearch_snapmove::snapshot::{SnapshotDescriptor, SnapshotState};
use elasticsearch_snapmove::{MoveError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap()
}

pub fn millis(t: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(t).unwrap()
}

/// Snapshot metadata plus the doc counts it captured.
#[derive(Default)]
pub struct Repository {
    pub snapshots: Vec<SnapshotDescriptor>,
    pub contents: HashMap<String, HashMap<String, u64>>,
}

impl Repository {
    pub fn with_snapshot(
        mut self, name: &str, state: SnapshotState, end_millis: i64,
        indices: &[(&str, u64)],
    ) -> Self {
        self.snapshots.push(SnapshotDescriptor {
            name: name.to_string(),
            state,
            indices: indices.iter().map(|(i, _)| i.to_string()).collect(),
            start_time: Some(millis(end_millis - 1)),
            end_time: Some(millis(end_millis)),
        });
        self.contents.insert(
            name.to_string(),
            indices.iter().map(|(i, c)| (i.to_string(), *c)).collect(),
        );
        self
    }
}

pub type Repositories = Arc<Mutex<HashMap<String, Repository>>>;

pub fn repositories(entries: Vec<(&str, Repository)>) -> Repositories {
    Arc::new(Mutex::new(
        entries.into_iter().map(|(name, r)| (name.to_string(), r)).collect(),
    ))
}

pub struct InMemoryCluster {
    url: String,
    indices: Mutex<Vec<(IndexDescriptor, u64)>>,
    repositories: Repositories,
    calls: Mutex<Vec<String>>,
    running: Mutex<usize>,
    pub unreachable: bool,
    /// State a snapshot created here ends in.
    pub snapshot_outcome: SnapshotState,
    /// Docs lost by every restore into this cluster.
    pub restore_loss: u64,
}

impl InMemoryCluster {
    pub fn new(url: &str, repositories: Repositories) -> Self {
        InMemoryCluster {
            url: url.to_string(),
            indices: Mutex::new(Vec::new()),
            repositories,
            calls: Mutex::new(Vec::new()),
            running: Mutex::new(0),
            unreachable: false,
            snapshot_outcome: SnapshotState::Success,
            restore_loss: 0,
        }
    }

    pub fn with_index(self, name: &str, age_days: i64, docs: u64) -> Self {
        self.indices.lock().unwrap().push((
            IndexDescriptor {
                name: name.to_string(),
                creation_date: now() - Duration::days(age_days),
                doc_count: Some(docs),
            },
            docs,
        ));
        self
    }

    pub fn with_running_snapshots(self, running: usize) -> Self {
        *self.running.lock().unwrap() = running;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, operation: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(operation))
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indices.lock().unwrap().iter().any(|(i, _)| i.name == name)
    }

    fn record(&self, call: String) -> Result<()> {
        if self.unreachable {
            return Err(MoveError::Connection {
                url: self.url.clone(),
                reason: "connection refused".to_string(),
            });
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn missing_repository(repository: &str) -> MoveError {
        MoveError::RepositoryNotFound(repository.to_string())
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    fn url(&self) -> &str {
        &self.url
    }

    async fn list_indices(&self) -> Result<Vec<IndexDescriptor>> {
        self.record("list_indices".to_string())?;
        Ok(self.indices.lock().unwrap().iter().map(|(i, _)| i.clone()).collect())
    }

    async fn list_snapshots(
        &self, repository: &str,
    ) -> Result<Vec<SnapshotDescriptor>> {
        self.record(format!("list_snapshots {}", repository))?;
        let repos = self.repositories.lock().unwrap();
        let repo = repos
            .get(repository)
            .ok_or_else(|| Self::missing_repository(repository))?;
        Ok(repo.snapshots.clone())
    }

    async fn get_snapshot(
        &self, repository: &str, snapshot: &str,
    ) -> Result<SnapshotDescriptor> {
        self.record(format!("get_snapshot {}", snapshot))?;
        let repos = self.repositories.lock().unwrap();
        let repo = repos
            .get(repository)
            .ok_or_else(|| Self::missing_repository(repository))?;
        repo.snapshots
            .iter()
            .find(|s| s.name == snapshot)
            .cloned()
            .ok_or_else(|| MoveError::SnapshotNotFound {
                repository: repository.to_string(),
                snapshot: snapshot.to_string(),
            })
    }

    async fn running_snapshots(&self) -> Result<usize> {
        self.record("running_snapshots".to_string())?;
        let mut running = self.running.lock().unwrap();
        let now_running = *running;
        *running = running.saturating_sub(1);
        Ok(now_running)
    }

    async fn create_snapshot(
        &self, repository: &str, snapshot: &str, indices: &[String],
    ) -> Result<()> {
        self.record(format!("create_snapshot {}", snapshot))?;
        let counts = self
            .indices
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, _)| indices.contains(&i.name))
            .map(|(i, c)| (i.name.clone(), *c))
            .collect::<HashMap<_, _>>();
        let mut repos = self.repositories.lock().unwrap();
        let repo = repos
            .get_mut(repository)
            .ok_or_else(|| Self::missing_repository(repository))?;
        if repo.snapshots.iter().any(|s| s.name == snapshot) {
            return Err(MoveError::Client {
                operation: "create snapshot".to_string(),
                reason: format!("snapshot with the same name {} exists", snapshot),
            });
        }
        repo.snapshots.push(SnapshotDescriptor {
            name: snapshot.to_string(),
            state: self.snapshot_outcome,
            indices: indices.to_vec(),
            start_time: Some(now()),
            end_time: Some(now() + Duration::seconds(1)),
        });
        repo.contents.insert(snapshot.to_string(), counts);
        Ok(())
    }

    async fn restore_snapshot(
        &self, repository: &str, snapshot: &str, indices: &[String],
    ) -> Result<()> {
        self.record(format!("restore_snapshot {}", snapshot))?;
        let repos = self.repositories.lock().unwrap();
        let repo = repos
            .get(repository)
            .ok_or_else(|| Self::missing_repository(repository))?;
        let contents = repo.contents.get(snapshot).ok_or_else(|| {
            MoveError::SnapshotNotFound {
                repository: repository.to_string(),
                snapshot: snapshot.to_string(),
            }
        })?;
        let mut local = self.indices.lock().unwrap();
        for index in indices {
            let docs = contents.get(index).copied().unwrap_or(0);
            let docs = docs.saturating_sub(self.restore_loss);
            local.push((
                IndexDescriptor {
                    name: index.clone(),
                    creation_date: now(),
                    doc_count: Some(docs),
                },
                docs,
            ));
        }
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.record(format!("delete_index {}", index))?;
        self.indices.lock().unwrap().retain(|(i, _)| i.name != index);
        Ok(())
    }

    async fn count_documents(&self, index: &str) -> Result<Option<u64>> {
        self.record(format!("count_documents {}", index))?;
        Ok(self
            .indices
            .lock()
            .unwrap()
            .iter()
            .find(|(i, _)| i.name == index)
            .map(|(_, c)| *c))
    }
}
