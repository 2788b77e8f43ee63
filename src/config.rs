use std::time::Duration;

pub const DEFAULT_SOURCE_URL: &str = "http://localhost:9200";
pub const DEFAULT_DESTINATION_URL: &str = "http://localhost:9201";
pub const DEFAULT_REPOSITORY: &str = "es-snapshots";

/// Everything one run of the move job needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Indices younger than this stay in the source cluster.
    pub days_to_keep: u32,
    pub source_url: String,
    pub destination_url: String,
    /// Snapshot repository, registered on both clusters.
    pub repository: String,
    pub verify_certs: bool,
    /// Inspect and select only; never create, restore or delete.
    pub dry_run: bool,
    /// Per request timeout for the cluster clients.
    pub request_timeout: Duration,
    /// How often a timed out read request is retried.
    pub max_retries: u32,
    /// Restores wait for completion, so they get their own timeout.
    pub restore_timeout: Duration,
    /// Pause between snapshot status checks.
    pub poll_interval: Duration,
    /// Snapshot status checks before giving up. At least 1: with 0 a created
    /// snapshot would never be checked.
    pub max_polls: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            days_to_keep: 3,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            destination_url: DEFAULT_DESTINATION_URL.to_string(),
            repository: DEFAULT_REPOSITORY.to_string(),
            verify_certs: true,
            dry_run: false,
            request_timeout: Duration::from_secs(30),
            max_retries: 2,
            restore_timeout: Duration::from_secs(3600),
            poll_interval: Duration::from_secs(10),
            max_polls: 360,
        }
    }
}
