//! Map record and its display options.
//!
//! # Invariants
//! - `id` is generated at creation and never reused.
//! - Deleting a map removes every node it owns.

use crate::retention::deletion_deadline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable map identifier shared by the map and all of its nodes.
pub type MapId = Uuid;

/// Client display options stored per map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapOptions {
    pub font_max_size: u32,
    pub font_min_size: u32,
    pub font_increment: u32,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            font_max_size: 70,
            font_min_size: 15,
            font_increment: 5,
        }
    }
}

/// Persisted map record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Map {
    pub id: MapId,
    /// Stamped on creation, option updates and full rebuilds.
    pub last_modified: DateTime<Utc>,
    /// Opaque client payload stored verbatim as JSON.
    pub data: Option<serde_json::Value>,
    /// Retention window recorded when the map was created.
    pub delete_after_days: Option<u32>,
    /// Deletion deadline, recomputed by every map or node mutation.
    pub deleted_at: Option<DateTime<Utc>>,
    pub options: MapOptions,
}

impl Map {
    /// Creates an empty map with a generated id.
    pub fn new(last_modified: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            last_modified,
            data: None,
            delete_after_days: None,
            deleted_at: None,
            options: MapOptions::default(),
        }
    }
}

/// Cache-side admin record kept by the collaboration layer for one map.
///
/// The core never mutates these; it only produces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminMapEntry {
    pub map_id: MapId,
    pub admin_id: String,
    pub modification_secret: String,
    /// Instant after which the entry may be evicted.
    pub ttl: DateTime<Utc>,
    pub root_name: Option<String>,
}

impl AdminMapEntry {
    /// Builds the admin record for `map`, expiring with its retention window.
    pub fn for_map(
        map: &Map,
        admin_id: impl Into<String>,
        modification_secret: impl Into<String>,
        retention_days: u32,
    ) -> Self {
        Self {
            map_id: map.id,
            admin_id: admin_id.into(),
            modification_secret: modification_secret.into(),
            ttl: deletion_deadline(map.last_modified, retention_days),
            root_name: None,
        }
    }

    pub fn with_root_name(mut self, root_name: impl Into<String>) -> Self {
        self.root_name = Some(root_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{AdminMapEntry, Map, MapOptions};
    use chrono::{TimeZone, Utc};

    #[test]
    fn options_fill_missing_fields_with_defaults() {
        let options: MapOptions =
            serde_json::from_str(r#"{"fontMaxSize": 80}"#).expect("partial options parse");
        assert_eq!(options.font_max_size, 80);
        assert_eq!(options.font_min_size, MapOptions::default().font_min_size);
    }

    #[test]
    fn admin_entry_expires_with_retention_window() {
        let map = Map::new(Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap());
        let entry = AdminMapEntry::for_map(&map, "admin-1", "secret", 30).with_root_name("Ideas");

        assert_eq!(entry.map_id, map.id);
        assert_eq!(entry.ttl, Utc.with_ymd_and_hms(2024, 5, 31, 9, 0, 0).unwrap());
        assert_eq!(entry.root_name.as_deref(), Some("Ideas"));

        let json = serde_json::to_value(&entry).expect("entry serializes");
        assert_eq!(json["adminId"], "admin-1");
        assert_eq!(json["modificationSecret"], "secret");
    }
}
