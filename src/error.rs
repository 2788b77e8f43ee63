use thiserror::Error;

/// Errors raised while inspecting clusters or moving an index between them.
#[derive(Error, Debug)]
pub enum MoveError {
    /// Cluster unreachable, timed out, or rejected our credentials.
    #[error("cannot reach cluster {url}: {reason}")]
    Connection { url: String, reason: String },
    /// The cluster answered, but not with something we understand.
    #[error("unexpected response from {operation}: {reason}")]
    Client { operation: String, reason: String },
    #[error("snapshot repository {0} not found")]
    RepositoryNotFound(String),
    #[error("snapshot repository {0} holds no completed snapshots")]
    NoSnapshots(String),
    #[error("snapshot {snapshot} not found in repository {repository}")]
    SnapshotNotFound { repository: String, snapshot: String },
    #[error("no index is older than {days_to_keep} days")]
    NoEligibleIndex { days_to_keep: u32 },
    #[error("requested {requested} indices but only {available} remain")]
    EmptySelection { requested: usize, available: usize },
    #[error("snapshot {snapshot} finished in state {state}")]
    SnapshotFailed { snapshot: String, state: String },
    #[error("snapshot {snapshot} still running after {polls} polls")]
    SnapshotTimeout { snapshot: String, polls: u32 },
    #[error("other snapshots still running after {polls} polls")]
    SnapshotBusy { polls: u32 },
    #[error(
        "doc count mismatch for {index}: source has {source_count}, \
         destination has {destination_count}"
    )]
    MoveVerification {
        index: String,
        source_count: u64,
        destination_count: u64,
    },
}

impl MoveError {
    pub(crate) fn client(operation: &str, reason: impl ToString) -> Self {
        MoveError::Client {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn connection(url: &str, reason: impl ToString) -> Self {
        MoveError::Connection { url: url.to_string(), reason: reason.to_string() }
    }
}

pub type Result<T, E = MoveError> = std::result::Result<T, E>;
