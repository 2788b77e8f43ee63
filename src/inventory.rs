//! Index inventory of one cluster and the pure filter stages that narrow it
//! down to the indices eligible for a move.
//!
//! Every stage takes an [`IndexInventory`] by value and returns a new one, so
//! stages compose as a pipeline and each can be tested on its own:
//!
//! ```ignore
//! let eligible = select_oldest_n(
//!     filter_by_age(exclude_system_indices(inventory), 3, AgeField::CreationDate, now),
//!     1,
//!     AgeField::CreationDate,
//! )?;
//! ```
use crate::client::ClusterClient;
use crate::error::{MoveError, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;

/// Names owned by kibana and marvel outside the dot namespace.
const RESERVED_PREFIXES: &[&str] = &["kibana-int"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub name: String,
    pub creation_date: DateTime<Utc>,
    /// `None` for closed indices, the cat api reports no count for them.
    pub doc_count: Option<u64>,
}

impl IndexDescriptor {
    /// True for indices reserved for dashboard or cluster tooling, i.e.
    /// `.kibana`, `.marvel-es-data`, `kibana-int`.
    pub fn is_system(&self) -> bool {
        is_system_index(&self.name)
    }
}

pub fn is_system_index(name: &str) -> bool {
    name.starts_with('.')
        || RESERVED_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Timestamp an age filter or ordering is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeField {
    CreationDate,
}

impl AgeField {
    fn of(self, index: &IndexDescriptor) -> DateTime<Utc> {
        match self {
            AgeField::CreationDate => index.creation_date,
        }
    }
}

/// Indices of one cluster at one point in time. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexInventory {
    indices: Vec<IndexDescriptor>,
}

impl IndexInventory {
    /// Build an inventory, keeping the first descriptor seen for a name.
    pub fn new(indices: Vec<IndexDescriptor>) -> Self {
        let mut seen = HashSet::new();
        let indices = indices
            .into_iter()
            .filter(|i| {
                let fresh = seen.insert(i.name.clone());
                if !fresh {
                    log::warn!("duplicate index {} in inventory, dropped", i.name);
                }
                fresh
            })
            .collect();
        IndexInventory { indices }
    }

    pub fn indices(&self) -> &[IndexDescriptor] {
        &self.indices
    }

    pub fn names(&self) -> Vec<&str> {
        self.indices.iter().map(|i| i.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indices.iter().find(|i| i.name == name)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn retain<F>(self, keep: F) -> Self
    where
        F: FnMut(&IndexDescriptor) -> bool,
    {
        IndexInventory { indices: self.indices.into_iter().filter(keep).collect() }
    }
}

impl IntoIterator for IndexInventory {
    type Item = IndexDescriptor;
    type IntoIter = std::vec::IntoIter<IndexDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.indices.into_iter()
    }
}

/// Query every index of the cluster behind `client`.
pub async fn load_inventory<C>(client: &C) -> Result<IndexInventory>
where
    C: ClusterClient + ?Sized,
{
    let indices = client.list_indices().await?;
    log::debug!("{} indices loaded from {}", indices.len(), client.url());
    Ok(IndexInventory::new(indices))
}

pub fn exclude_system_indices(inventory: IndexInventory) -> IndexInventory {
    inventory.retain(|i| !i.is_system())
}

/// Keep indices whose `field` is strictly before `now - threshold_days`.
pub fn filter_by_age(
    inventory: IndexInventory, threshold_days: u32, field: AgeField,
    now: DateTime<Utc>,
) -> IndexInventory {
    let cutoff = now.checked_sub_signed(Duration::days(i64::from(threshold_days)));
    let inventory = inventory.retain(|i| match cutoff {
        Some(cutoff) => field.of(i) < cutoff,
        // cutoff before the earliest representable date
        None => false,
    });
    log::info!(
        "indices(> {} days): {:?}",
        threshold_days,
        inventory.names()
    );
    inventory
}

/// Order by `field` ascending, ties by name, and keep the first `n`.
pub fn select_oldest_n(
    inventory: IndexInventory, n: usize, field: AgeField,
) -> Result<IndexInventory> {
    if inventory.len() < n {
        return Err(MoveError::EmptySelection {
            requested: n,
            available: inventory.len(),
        });
    }
    let mut indices = inventory.indices;
    indices.sort_by(|a, b| {
        field.of(a).cmp(&field.of(b)).then_with(|| a.name.cmp(&b.name))
    });
    indices.truncate(n);
    Ok(IndexInventory { indices })
}
