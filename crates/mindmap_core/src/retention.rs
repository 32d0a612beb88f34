//! Deletion-deadline arithmetic for the retention window.
//!
//! # Invariants
//! - Deadlines add whole calendar days in UTC to the reference instant.
//! - A map's reference instant is its newest node's `last_modified`, or the
//!   map's own `last_modified` when it has no nodes.

use crate::model::map::Map;
use crate::model::node::Node;
use chrono::{DateTime, Days, Utc};

/// Returns `last_modified + retention_days` calendar days.
///
/// Saturates at the largest representable instant instead of failing.
pub fn deletion_deadline(last_modified: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    last_modified
        .checked_add_days(Days::new(u64::from(retention_days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Instant from which a map's retention window is measured.
pub fn retention_reference(map: &Map, newest_node: Option<DateTime<Utc>>) -> DateTime<Utc> {
    newest_node.unwrap_or(map.last_modified)
}

/// Deadline for `map` given the nodes it currently owns.
pub fn map_deletion_deadline(map: &Map, nodes: &[Node], retention_days: u32) -> DateTime<Utc> {
    let newest = nodes.iter().map(|node| node.last_modified).max();
    deletion_deadline(retention_reference(map, newest), retention_days)
}

#[cfg(test)]
mod tests {
    use super::{deletion_deadline, map_deletion_deadline};
    use crate::model::map::Map;
    use crate::model::node::Node;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;
    use uuid::Uuid;

    #[test]
    fn adds_calendar_days() {
        let start = Utc.with_ymd_and_hms(2024, 2, 27, 12, 30, 0).unwrap();
        let deadline = deletion_deadline(start, 3);
        assert_eq!(deadline, Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn zero_days_is_identity() {
        let start = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(deletion_deadline(start, 0), start);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        assert_eq!(
            deletion_deadline(DateTime::<Utc>::MAX_UTC, 1),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[test]
    fn empty_map_uses_own_timestamp() {
        let start = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
        let map = Map::new(start);
        assert_eq!(
            map_deletion_deadline(&map, &[], 30),
            Utc.with_ymd_and_hms(2024, 2, 9, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn map_with_nodes_uses_newest_node() {
        let map_created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let map = Map::new(map_created);
        let older = Node::new_root(Uuid::new_v4(), map.id, map_created + Duration::days(1));
        let newer = Node::new_child(
            Uuid::new_v4(),
            map.id,
            older.id,
            map_created + Duration::days(5),
        );

        let deadline = map_deletion_deadline(&map, &[newer.clone(), older], 10);
        assert_eq!(deadline, newer.last_modified + Duration::days(10));
    }

    proptest! {
        #[test]
        fn deadline_is_exactly_n_days_later(
            millis in 0i64..4_102_444_800_000,
            days in 0u32..3650,
        ) {
            let start = DateTime::from_timestamp_millis(millis).unwrap();
            let copy = start;
            let deadline = deletion_deadline(start, days);
            prop_assert_eq!(deadline - start, Duration::days(i64::from(days)));
            prop_assert_eq!(start, copy);
        }
    }
}
