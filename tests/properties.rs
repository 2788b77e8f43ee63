//! Property-based tests for the selection policy.

use chrono::{DateTime, Duration, TimeZone, Utc};
use elasticsearch_snapmove::inventory::{
    exclude_system_indices, filter_by_age, is_system_index, AgeField,
    IndexDescriptor, IndexInventory,
};
use elasticsearch_snapmove::selector::next_candidate;
use elasticsearch_snapmove::snapshot::{most_recent, SnapshotDescriptor, SnapshotState};
use elasticsearch_snapmove::MoveError;
use proptest::prelude::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap()
}

/// Strategy for index names, a fair share of them system indices.
fn index_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9-]{0,10}",
        "\\.[a-z][a-z0-9-]{0,10}",
        "kibana-int[a-z0-9-]{0,4}",
    ]
}

/// Strategy for inventories with ages up to 30 days, in minutes.
fn inventory() -> impl Strategy<Value = IndexInventory> {
    prop::collection::vec((index_name(), 0i64..30 * 24 * 60), 0..20).prop_map(
        |entries| {
            IndexInventory::new(
                entries
                    .into_iter()
                    .map(|(name, age_minutes)| IndexDescriptor {
                        name,
                        creation_date: now() - Duration::minutes(age_minutes),
                        doc_count: Some(1),
                    })
                    .collect(),
            )
        },
    )
}

fn snapshots() -> impl Strategy<Value = Vec<SnapshotDescriptor>> {
    prop::collection::vec(("snap-[0-9]{1,3}", 1i64..1000), 1..10).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|(name, end)| SnapshotDescriptor {
                    name,
                    state: SnapshotState::Success,
                    indices: Vec::new(),
                    start_time: None,
                    end_time: Utc.timestamp_millis_opt(end).single(),
                })
                .collect()
        },
    )
}

proptest! {
    /// Property: no system index survives exclusion, no other index is lost.
    #[test]
    fn test_exclusion_removes_only_system_indices(inv in inventory()) {
        let expected = inv
            .indices()
            .iter()
            .filter(|i| !is_system_index(&i.name))
            .map(|i| i.name.clone())
            .collect::<Vec<_>>();
        let kept = exclude_system_indices(inv);
        prop_assert!(kept.indices().iter().all(|i| !is_system_index(&i.name)));
        prop_assert_eq!(kept.names(), expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    /// Property: every index kept by the age filter is strictly older than the cutoff.
    #[test]
    fn test_age_filter_is_strict(inv in inventory(), days in 0u32..40) {
        let cutoff = now() - Duration::days(i64::from(days));
        let kept = filter_by_age(inv.clone(), days, AgeField::CreationDate, now());
        prop_assert!(kept.indices().iter().all(|i| i.creation_date < cutoff));
        let dropped_old = inv
            .indices()
            .iter()
            .filter(|i| i.creation_date < cutoff)
            .count();
        prop_assert_eq!(kept.len(), dropped_old);
    }

    /// Property: selection ignores inventory order and always picks the
    /// oldest eligible index.
    #[test]
    fn test_selection_is_deterministic(inv in inventory(), days in 0u32..10) {
        let reversed = IndexInventory::new(inv.clone().into_iter().rev().collect());
        match (next_candidate(inv.clone(), days, now()), next_candidate(reversed, days, now())) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(&a, &b);
                prop_assert!(!is_system_index(&a.name));
                let cutoff = now() - Duration::days(i64::from(days));
                for other in inv.indices() {
                    if !is_system_index(&other.name) && other.creation_date < cutoff {
                        prop_assert!(
                            (a.creation_date, &a.name) <= (other.creation_date, &other.name)
                        );
                    }
                }
            }
            (Err(MoveError::NoEligibleIndex { .. }), Err(MoveError::NoEligibleIndex { .. })) => {}
            (a, b) => prop_assert!(false, "diverging selections {:?} {:?}", a, b),
        }
    }

    /// Property: the most recent snapshot has the greatest completion time,
    /// ties going to the greatest name.
    #[test]
    fn test_most_recent_is_maximum(snaps in snapshots()) {
        let latest = most_recent(&snaps).unwrap();
        for s in &snaps {
            prop_assert!((s.end_time, &s.name) <= (latest.end_time, &latest.name));
        }
    }
}
