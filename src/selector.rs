use crate::client::ClusterClient;
use crate::error::{MoveError, Result};
use crate::inventory::{
    exclude_system_indices, filter_by_age, load_inventory, select_oldest_n,
    AgeField, IndexDescriptor, IndexInventory,
};
use chrono::{DateTime, Utc};

/// Indices older than `days_to_keep`, system indices excluded.
pub fn indices_to_move(
    inventory: IndexInventory, days_to_keep: u32, now: DateTime<Utc>,
) -> IndexInventory {
    filter_by_age(
        exclude_system_indices(inventory),
        days_to_keep,
        AgeField::CreationDate,
        now,
    )
}

/// The oldest eligible index; equal creation dates go to the smaller name.
pub fn next_candidate(
    inventory: IndexInventory, days_to_keep: u32, now: DateTime<Utc>,
) -> Result<IndexDescriptor> {
    let eligible = indices_to_move(inventory, days_to_keep, now);
    select_oldest_n(eligible, 1, AgeField::CreationDate)
        .ok()
        .and_then(|picked| picked.into_iter().next())
        .ok_or(MoveError::NoEligibleIndex { days_to_keep })
}

/// Load the inventory behind `client` and pick the next index to move.
pub async fn next_index_to_move<C>(
    client: &C, days_to_keep: u32, now: DateTime<Utc>,
) -> Result<IndexDescriptor>
where
    C: ClusterClient + ?Sized,
{
    let inventory = load_inventory(client).await?;
    let index = next_candidate(inventory, days_to_keep, now)?;
    log::info!("next index to move: {}", index.name);
    Ok(index)
}
