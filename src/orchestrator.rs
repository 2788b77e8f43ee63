//! One run of the move job: inspect the snapshot repository, pick the next
//! index, then snapshot it, restore it into the destination, verify the doc
//! count and only then delete it from the source.
//!
//! Every step aborts the run on failure, so the source index is deleted only
//! after the destination holds a copy with the same doc count.
use crate::client::ClusterClient;
use crate::config::Config;
use crate::error::{MoveError, Result};
use crate::es::EsClusterClient;
use crate::selector::next_index_to_move;
use crate::snapshot::{
    covering_snapshot, indices_of, most_recent_snapshot, SnapshotDescriptor,
    SnapshotState,
};
use anyhow::Context;
use chrono::{DateTime, Utc};

/// How the selected index reaches the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// The destination already holds the index with the source's doc count.
    AlreadyRestored,
    /// Restore from `snapshot`, creating it first when `create` is set.
    Restore { snapshot: String, create: bool },
}

/// What a run saw and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub latest_snapshot: String,
    pub latest_snapshot_indices: Vec<String>,
    pub index: String,
    pub source_count: u64,
    pub destination_count: Option<u64>,
    pub plan: Plan,
    /// False for dry runs.
    pub executed: bool,
}

/// Connect to both clusters and move one index.
pub async fn run(config: &Config) -> anyhow::Result<Report> {
    let source = EsClusterClient::connect(&config.source_url, config)
        .context("connecting to source cluster")?;
    let destination = EsClusterClient::connect(&config.destination_url, config)
        .context("connecting to destination cluster")?;
    run_with(&source, &destination, config, Utc::now()).await
}

pub async fn run_with<S, D>(
    source: &S, destination: &D, config: &Config, now: DateTime<Utc>,
) -> anyhow::Result<Report>
where
    S: ClusterClient + ?Sized,
    D: ClusterClient + ?Sized,
{
    let repository = config.repository.as_str();
    println!("Starting Elasticsearch index move job using: {}", source.url());

    let latest = most_recent_snapshot(source, repository)
        .await
        .with_context(|| {
            format!("resolving most recent snapshot in {}", repository)
        })?;
    let latest_indices = indices_of(source, repository, &latest.name)
        .await
        .with_context(|| format!("reading snapshot {}", latest.name))?;
    println!("Most recent snapshot: {}", latest.name);
    println!("    Containing indices: {:?}", latest_indices);

    let index = next_index_to_move(source, config.days_to_keep, now)
        .await
        .context("selecting next index to move")?
        .name;
    println!("Next index to move: {}", index);

    let source_count = source
        .count_documents(&index)
        .await
        .and_then(|count| {
            count.ok_or_else(|| {
                MoveError::client("count", format!("{} vanished", index))
            })
        })
        .context("counting documents in source cluster")?;
    let destination_count = destination
        .count_documents(&index)
        .await
        .context("counting documents in destination cluster")?;
    println!("Doc count in source cluster: {}", source_count);
    match destination_count {
        Some(count) => println!("Doc count in destination cluster: {}", count),
        None => println!("Doc count in destination cluster: (index absent)"),
    }

    let plan = plan_move(
        source,
        config,
        &index,
        source_count,
        destination_count,
        now,
    )
    .await
    .context("planning move")?;

    let mut report = Report {
        latest_snapshot: latest.name,
        latest_snapshot_indices: latest_indices,
        index,
        source_count,
        destination_count,
        plan,
        executed: false,
    };

    if config.dry_run {
        print_plan(&report, repository);
        return Ok(report);
    }

    execute(source, destination, config, &report)
        .await
        .with_context(|| format!("moving index {}", report.index))?;
    report.executed = true;
    println!("Moved {} ({} docs) to {}", report.index, source_count, destination.url());
    Ok(report)
}

/// Decide how `index` gets to the destination. Read only.
async fn plan_move<S>(
    source: &S, config: &Config, index: &str, source_count: u64,
    destination_count: Option<u64>, now: DateTime<Utc>,
) -> Result<Plan>
where
    S: ClusterClient + ?Sized,
{
    match destination_count {
        Some(count) if count == source_count => {
            log::info!("{} already restored with {} docs", index, count);
            return Ok(Plan::AlreadyRestored);
        }
        Some(count) => {
            // a diverging copy is never overwritten
            return Err(MoveError::MoveVerification {
                index: index.to_string(),
                source_count,
                destination_count: count,
            });
        }
        None => {}
    }
    let snapshots = source.list_snapshots(&config.repository).await?;
    Ok(match covering_snapshot(&snapshots, index) {
        Some(existing) => {
            log::info!("reusing snapshot {} for {}", existing.name, index);
            Plan::Restore { snapshot: existing.name.clone(), create: false }
        }
        None => Plan::Restore {
            snapshot: fresh_snapshot_name(&snapshots, index, now),
            create: true,
        },
    })
}

/// Snapshots are named after the index they hold. When an earlier run left a
/// snapshot of that name behind (failed, partial or still running), the new
/// one gets a `-<epoch millis>` suffix.
fn fresh_snapshot_name(
    snapshots: &[SnapshotDescriptor], index: &str, now: DateTime<Utc>,
) -> String {
    let taken = |name: &str| snapshots.iter().any(|s| s.name == name);
    if !taken(index) {
        return index.to_string();
    }
    let mut millis = now.timestamp_millis();
    let mut name = format!("{}-{}", index, millis);
    while taken(&name) {
        millis += 1;
        name = format!("{}-{}", index, millis);
    }
    log::info!("snapshot {} already exists, using {}", index, name);
    name
}

fn print_plan(report: &Report, repository: &str) {
    let index = &report.index;
    match &report.plan {
        Plan::AlreadyRestored => {
            println!("[dry-run] {} already present in destination", index);
        }
        Plan::Restore { snapshot, create } => {
            if *create {
                println!(
                    "[dry-run] would create snapshot {} of {} in {}",
                    snapshot, index, repository
                );
            } else {
                println!("[dry-run] would reuse snapshot {}", snapshot);
            }
            println!(
                "[dry-run] would restore {} from {} into destination",
                index, snapshot
            );
            println!("[dry-run] would verify doc count {}", report.source_count);
        }
    }
    println!("[dry-run] would delete {} from source", index);
}

async fn execute<S, D>(
    source: &S, destination: &D, config: &Config, report: &Report,
) -> Result<()>
where
    S: ClusterClient + ?Sized,
    D: ClusterClient + ?Sized,
{
    let index = &report.index;
    if let Plan::Restore { snapshot, create } = &report.plan {
        if *create {
            take_snapshot_and_check(source, config, snapshot, index).await?;
        }
        let indices = vec![index.clone()];
        destination
            .restore_snapshot(&config.repository, snapshot, &indices)
            .await?;
        println!("Restored {} from snapshot {}", index, snapshot);

        let restored =
            destination.count_documents(index).await?.ok_or_else(|| {
                MoveError::client(
                    "restore snapshot",
                    format!("{} absent from destination after restore", index),
                )
            })?;
        if restored != report.source_count {
            return Err(MoveError::MoveVerification {
                index: index.clone(),
                source_count: report.source_count,
                destination_count: restored,
            });
        }
    }
    source.delete_index(index).await?;
    println!("Deleted {} from source cluster", index);
    Ok(())
}

/// Take a snapshot of `index` named `snapshot` and wait until it succeeds.
/// Snapshots already running are waited out first, the cluster runs one at a
/// time.
async fn take_snapshot_and_check<C>(
    client: &C, config: &Config, snapshot: &str, index: &str,
) -> Result<()>
where
    C: ClusterClient + ?Sized,
{
    let mut polls = 0;
    while client.running_snapshots().await? > 0 {
        polls += 1;
        if polls >= config.max_polls {
            return Err(MoveError::SnapshotBusy { polls });
        }
        tokio::time::sleep(config.poll_interval).await;
    }

    client
        .create_snapshot(&config.repository, snapshot, &[index.to_string()])
        .await?;
    println!("Creating snapshot {} of {}", snapshot, index);

    for _ in 0..config.max_polls {
        let status = client.get_snapshot(&config.repository, snapshot).await?;
        match status.state {
            SnapshotState::Success => return Ok(()),
            SnapshotState::InProgress => {
                log::info!(
                    "snapshot {} is not ready, sleep {:?}...",
                    snapshot,
                    config.poll_interval
                );
                tokio::time::sleep(config.poll_interval).await;
            }
            state => {
                return Err(MoveError::SnapshotFailed {
                    snapshot: snapshot.to_string(),
                    state: state.to_string(),
                })
            }
        }
    }
    Err(MoveError::SnapshotTimeout {
        snapshot: snapshot.to_string(),
        polls: config.max_polls,
    })
}
