use crate::client::ClusterClient;
use crate::config::Config;
use crate::date;
use crate::error::{MoveError, Result};
use crate::inventory::IndexDescriptor;
use crate::snapshot::SnapshotDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use elasticsearch::{
    cat::CatIndicesParts,
    cert::CertificateValidation,
    http::{
        response::Response,
        transport::{SingleNodeConnectionPool, TransportBuilder},
        StatusCode,
    },
    indices::IndicesDeleteParts,
    snapshot::{
        SnapshotCreateParts, SnapshotGetParts, SnapshotRestoreParts,
        SnapshotStatusParts,
    },
    CountParts, Elasticsearch, Error,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use url::Url;

#[derive(Deserialize, Debug)]
struct CatIndex {
    /// index name
    #[serde(rename(deserialize = "i"))]
    index: String,
    /// create_date
    #[serde(with = "date", rename(deserialize = "cd"))]
    creation_date: DateTime<Utc>,
    /// docs.count, null for closed indices
    #[serde(default, rename(deserialize = "dc"))]
    doc_count: Option<String>,
}

impl CatIndex {
    fn into_descriptor(self) -> Result<IndexDescriptor> {
        let CatIndex { index, creation_date, doc_count } = self;
        let doc_count = match doc_count {
            Some(dc) => Some(dc.parse::<u64>().map_err(|e| {
                MoveError::client(
                    "cat indices",
                    format!("docs.count {:?} of {}: {}", dc, index, e),
                )
            })?),
            None => None,
        };
        Ok(IndexDescriptor { name: index, creation_date, doc_count })
    }
}

#[derive(Deserialize, Debug)]
struct Snapshots {
    snapshots: Vec<SnapshotDescriptor>,
}

#[derive(Deserialize, Debug)]
struct SnapshotStatuses {
    snapshots: Vec<SnapshotStatus>,
}

#[derive(Deserialize, Debug)]
struct SnapshotStatus {
    snapshot: String,
    state: String,
}

#[derive(Deserialize, Debug)]
struct Count {
    count: u64,
}

/// A non-2xx answer, with the `error.type` elasticsearch reports, i.e.
///
/// ```json
/// {
///   "error" : {
///     "type" : "repository_missing_exception",
///     "reason" : "[es-snapshots] missing"
///   },
///   "status" : 404
/// }
/// ```
#[derive(Debug)]
struct ApiFailure {
    status: StatusCode,
    kind: Option<String>,
    reason: String,
}

impl ApiFailure {
    fn parse(status: StatusCode, body: &str) -> Self {
        let value = serde_json::from_str::<Value>(body).ok();
        let field = |path: &str| {
            value
                .as_ref()
                .and_then(|v| v.pointer(path))
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        let kind = field("/error/type");
        let reason = field("/error/reason").unwrap_or_else(|| body.to_string());
        ApiFailure { status, kind, reason }
    }

    fn is(&self, kind: &str) -> bool {
        self.kind.as_deref() == Some(kind)
    }
}

/// Timeouts are the only failures worth sending again, `max_retries` times at
/// most.
fn should_retry(timed_out: bool, attempt: u32, max_retries: u32) -> bool {
    timed_out && attempt < max_retries
}

/// 401 and 403 mean the cluster is unreachable for us, not a bad request.
fn rejects_credentials(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

/// Create a Elasticsearch client
///
/// `verify_certs = false` accepts any certificate the cluster presents.
pub fn create_client(
    addr: &str, verify_certs: bool, timeout: Duration,
) -> anyhow::Result<Elasticsearch, Error> {
    let url = Url::parse(addr)?;

    let conn_pool = SingleNodeConnectionPool::new(url);
    let mut builder = TransportBuilder::new(conn_pool).timeout(timeout);
    if !verify_certs {
        builder = builder.cert_validation(CertificateValidation::None);
    }

    let transport = builder.build()?;
    Ok(Elasticsearch::new(transport))
}

/// [`ClusterClient`] backed by the official elasticsearch client.
pub struct EsClusterClient {
    client: Elasticsearch,
    url: String,
    max_retries: u32,
    restore_timeout: Duration,
}

impl EsClusterClient {
    pub fn connect(addr: &str, config: &Config) -> Result<Self> {
        let client =
            create_client(addr, config.verify_certs, config.request_timeout)
                .map_err(|e| MoveError::connection(addr, e))?;
        Ok(EsClusterClient {
            client,
            url: addr.to_string(),
            max_retries: config.max_retries,
            restore_timeout: config.restore_timeout,
        })
    }

    /// Send a read request, retrying it when it times out.
    async fn send<F, Fut>(&self, operation: &str, request: F) -> Result<Response>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = std::result::Result<Response, Error>>,
    {
        let mut attempt = 0;
        loop {
            match request().await {
                Ok(response) => {
                    log::debug!("calling {} response : {:?}", operation, response);
                    return Ok(response);
                }
                Err(e) if should_retry(e.is_timeout(), attempt, self.max_retries) => {
                    attempt += 1;
                    log::warn!(
                        "{} on {} timed out, retry {}/{}",
                        operation,
                        self.url,
                        attempt,
                        self.max_retries
                    );
                }
                Err(e) => return Err(MoveError::connection(&self.url, e)),
            }
        }
    }

    /// Send a request that changes cluster state. Never retried: a timed out
    /// snapshot or restore may still be running on the cluster.
    async fn send_once<Fut>(&self, operation: &str, request: Fut) -> Result<Response>
    where
        Fut: Future<Output = std::result::Result<Response, Error>>,
    {
        let response =
            request.await.map_err(|e| MoveError::connection(&self.url, e))?;
        log::debug!("calling {} response : {:?}", operation, response);
        Ok(response)
    }

    /// Pass 2xx responses through, turn the rest into an [`ApiFailure`].
    /// 401 and 403 are connection errors whatever the operation.
    async fn success(
        &self, operation: &str, response: Response,
    ) -> Result<std::result::Result<Response, ApiFailure>> {
        let status = response.status_code();
        if status.is_success() {
            return Ok(Ok(response));
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                log::debug!("reading {} error body failed: {}", operation, e);
                String::new()
            }
        };
        let failure = ApiFailure::parse(status, &body);
        log::info!("{} failed: {:?}", operation, failure);
        if rejects_credentials(status) {
            return Err(MoveError::connection(&self.url, failure.reason));
        }
        Ok(Err(failure))
    }

    fn unexpected(operation: &str, failure: ApiFailure) -> MoveError {
        MoveError::client(
            operation,
            format!("status {}: {}", failure.status.as_u16(), failure.reason),
        )
    }

    fn snapshot_failure(
        operation: &str, repository: &str, snapshot: Option<&str>,
        failure: ApiFailure,
    ) -> MoveError {
        if failure.is("repository_missing_exception") {
            return MoveError::RepositoryNotFound(repository.to_string());
        }
        match snapshot {
            Some(snapshot) if failure.is("snapshot_missing_exception") => {
                MoveError::SnapshotNotFound {
                    repository: repository.to_string(),
                    snapshot: snapshot.to_string(),
                }
            }
            _ => Self::unexpected(operation, failure),
        }
    }

    async fn json<T>(operation: &str, response: Response) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        response.json::<T>().await.map_err(|e| MoveError::client(operation, e))
    }
}

#[async_trait]
impl ClusterClient for EsClusterClient {
    fn url(&self) -> &str {
        &self.url
    }

    async fn list_indices(&self) -> Result<Vec<IndexDescriptor>> {
        let op = "cat indices";
        let response = self
            .send(op, || async {
                self.client
                    .cat()
                    .indices(CatIndicesParts::None)
                    // h: Comma-separated list of column names to display
                    // i is index, cd is creation.date, dc is docs.count
                    .h(&["i", "cd", "dc"])
                    .format("json")
                    .send()
                    .await
            })
            .await?;
        let response = self
            .success(op, response)
            .await?
            .map_err(|f| Self::unexpected(op, f))?;
        let indices = Self::json::<Vec<CatIndex>>(op, response).await?;
        log::debug!("indices: {:#?}", indices);
        indices.into_iter().map(CatIndex::into_descriptor).collect()
    }

    async fn list_snapshots(
        &self, repository: &str,
    ) -> Result<Vec<SnapshotDescriptor>> {
        let op = "get snapshots";
        let response = self
            .send(op, || async {
                self.client
                    .snapshot()
                    .get(SnapshotGetParts::RepositorySnapshot(
                        repository,
                        &["_all"],
                    ))
                    .send()
                    .await
            })
            .await?;
        let response = self
            .success(op, response)
            .await?
            .map_err(|f| Self::snapshot_failure(op, repository, None, f))?;
        Ok(Self::json::<Snapshots>(op, response).await?.snapshots)
    }

    async fn get_snapshot(
        &self, repository: &str, snapshot: &str,
    ) -> Result<SnapshotDescriptor> {
        let op = "get snapshot";
        let names = [snapshot];
        let response = self
            .send(op, || async {
                self.client
                    .snapshot()
                    .get(SnapshotGetParts::RepositorySnapshot(repository, &names))
                    .send()
                    .await
            })
            .await?;
        let response = self.success(op, response).await?.map_err(|f| {
            Self::snapshot_failure(op, repository, Some(snapshot), f)
        })?;
        Self::json::<Snapshots>(op, response)
            .await?
            .snapshots
            .into_iter()
            .find(|s| s.name == snapshot)
            .ok_or_else(|| MoveError::SnapshotNotFound {
                repository: repository.to_string(),
                snapshot: snapshot.to_string(),
            })
    }

    async fn running_snapshots(&self) -> Result<usize> {
        let op = "snapshot status";
        log::info!("checking all snapshot status ...");
        let response = self
            .send(op, || async {
                self.client
                    .snapshot()
                    .status(SnapshotStatusParts::None)
                    .send()
                    .await
            })
            .await?;
        let response = self
            .success(op, response)
            .await?
            .map_err(|f| Self::unexpected(op, f))?;
        let statuses = Self::json::<SnapshotStatuses>(op, response).await?;
        for s in &statuses.snapshots {
            log::info!("snapshot {} is {}", s.snapshot, s.state);
        }
        Ok(statuses.snapshots.len())
    }

    async fn create_snapshot(
        &self, repository: &str, snapshot: &str, indices: &[String],
    ) -> Result<()> {
        let op = "create snapshot";
        log::info!("taking snapshot {} of {:?}, repository: {}", snapshot, indices, repository);
        let request = async {
            self.client
                .snapshot()
                .create(SnapshotCreateParts::RepositorySnapshot(
                    repository, snapshot,
                ))
                .body(json!({
                  "indices": indices.join(","),
                  "ignore_unavailable": false,
                  "include_global_state": false,
                  "metadata": {
                    "taken_by": "elasticsearch-snapmove",
                    "taken_because": "index move"
                  }
                }))
                .send()
                .await
        };
        let response = self.send_once(op, request).await?;
        self.success(op, response)
            .await?
            .map_err(|f| Self::snapshot_failure(op, repository, None, f))?;
        Ok(())
    }

    async fn restore_snapshot(
        &self, repository: &str, snapshot: &str, indices: &[String],
    ) -> Result<()> {
        let op = "restore snapshot";
        log::info!("restoring {:?} from snapshot {} on {}", indices, snapshot, self.url);
        let request = async {
            self.client
                .snapshot()
                .restore(SnapshotRestoreParts::RepositorySnapshot(
                    repository, snapshot,
                ))
                .wait_for_completion(true)
                .request_timeout(self.restore_timeout)
                .body(json!({
                  "indices": indices.join(","),
                  "include_global_state": false
                }))
                .send()
                .await
        };
        let response = self.send_once(op, request).await?;
        let response = self.success(op, response).await?.map_err(|f| {
            Self::snapshot_failure(op, repository, Some(snapshot), f)
        })?;
        let body = response
            .text()
            .await
            .map_err(|e| MoveError::client(op, e))?;
        log::info!("restore snapshot response: {:?}", body);
        Ok(())
    }

    /// Send DELETE for `index`. The acknowledgement body is only logged.
    async fn delete_index(&self, index: &str) -> Result<()> {
        let op = "delete index";
        let indices = [index];
        let request = async {
            self.client
                .indices()
                .delete(IndicesDeleteParts::Index(&indices))
                .send()
                .await
        };
        let response = self.send_once(op, request).await?;
        let response = self
            .success(op, response)
            .await?
            .map_err(|f| Self::unexpected(op, f))?;
        let body = response
            .text()
            .await
            .map_err(|e| MoveError::client(op, e))?;
        log::info!("delete index: {}, response: {:?}", index, body);
        Ok(())
    }

    async fn count_documents(&self, index: &str) -> Result<Option<u64>> {
        let op = "count";
        let indices = [index];
        let response = self
            .send(op, || async {
                self.client.count(CountParts::Index(&indices)).send().await
            })
            .await?;
        match self.success(op, response).await? {
            Ok(response) => {
                Ok(Some(Self::json::<Count>(op, response).await?.count))
            }
            Err(f) if f.is("index_not_found_exception") => Ok(None),
            Err(f) => Err(Self::unexpected(op, f)),
        }
    }
}
