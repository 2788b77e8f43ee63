use crate::config::{
    Config, DEFAULT_DESTINATION_URL, DEFAULT_REPOSITORY, DEFAULT_SOURCE_URL,
};
use std::env;
use std::time::Duration;
use structopt::StructOpt;

/// Move Elasticsearch indices between clusters via snapshot/restore
#[derive(StructOpt, Debug)]
#[structopt(name = "elasticsearch snapmove")]
pub struct Opt {
    /// Activate debug mode
    #[structopt(short, long)]
    pub debug: bool,

    // The number of occurrences of the `v/verbose` flag
    /// Verbose mode (-v, -vv, -vvv, etc.)
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,

    /// Number of days worth of indices to keep in source cluster
    #[structopt(long, default_value = "3")]
    pub days_to_keep: u32,

    /// The source Elasticsearch url (http://localhost:9200), or use
    /// ELASTICSEARCH_SOURCE_ADDR env
    #[structopt(long)]
    pub source_url: Option<String>,

    /// The destination Elasticsearch url (http://localhost:9201), or use
    /// ELASTICSEARCH_DESTINATION_ADDR env
    #[structopt(long)]
    pub destination_url: Option<String>,

    /// The snapshots repository (es-snapshots), or use ELASTICSEARCH_REPO env
    #[structopt(long)]
    pub repository: Option<String>,

    /// Do not verify TLS certificates of either cluster
    #[structopt(long)]
    pub no_verify_certs: bool,

    /// Print actions only
    #[structopt(long)]
    pub dry_run: bool,

    /// Timeout of a single request to a cluster, in seconds
    #[structopt(long, default_value = "30")]
    pub request_timeout_secs: u64,

    /// How many times a timed out request is retried
    #[structopt(long, default_value = "2")]
    pub max_retries: u32,

    /// How long a restore may take, in seconds
    #[structopt(long, default_value = "3600")]
    pub restore_timeout_secs: u64,

    /// Seconds between snapshot status checks
    #[structopt(long, default_value = "10")]
    pub poll_interval_secs: u64,

    /// Snapshot status checks before giving up, at least 1
    #[structopt(long, default_value = "360")]
    pub max_polls: u32,
}

impl Opt {
    /// Resolve env fallbacks and defaults into a [`Config`].
    pub fn into_config(self) -> anyhow::Result<Config> {
        if self.max_polls == 0 {
            anyhow::bail!("--max-polls must be at least 1");
        }
        Ok(Config {
            days_to_keep: self.days_to_keep,
            source_url: value_env_or(
                "ELASTICSEARCH_SOURCE_ADDR",
                self.source_url,
                DEFAULT_SOURCE_URL,
            ),
            destination_url: value_env_or(
                "ELASTICSEARCH_DESTINATION_ADDR",
                self.destination_url,
                DEFAULT_DESTINATION_URL,
            ),
            repository: value_env_or(
                "ELASTICSEARCH_REPO",
                self.repository,
                DEFAULT_REPOSITORY,
            ),
            verify_certs: !self.no_verify_certs,
            dry_run: self.dry_run,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_retries: self.max_retries,
            restore_timeout: Duration::from_secs(self.restore_timeout_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_polls: self.max_polls,
        })
    }

    /// Log level implied by `-d` and `-v`, used when RUST_LOG is unset.
    pub fn log_level(&self) -> log::LevelFilter {
        match (self.debug, self.verbose) {
            (_, v) if v >= 3 => log::LevelFilter::Trace,
            (true, _) | (_, 2) => log::LevelFilter::Debug,
            (_, 1) => log::LevelFilter::Info,
            _ => log::LevelFilter::Warn,
        }
    }
}

/// The command line value if given, else the env var `key`, else `default`.
pub fn value_env_or(key: &str, other: Option<String>, default: &str) -> String {
    match other {
        Some(v) => v,
        None => match env::var(key) {
            Ok(v) => v,
            Err(_) => default.to_string(),
        },
    }
}
