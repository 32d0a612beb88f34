//! Node record, content fields and partial updates.
//!
//! # Invariants
//! - A node is exactly one of: root, detached, or attached to a parent that
//!   lives in the same map.
//! - A detached node never carries a parent reference.

use crate::model::map::MapId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Node identifier, unique within its owning map.
pub type NodeId = Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeFont {
    pub size: Option<u32>,
    pub style: Option<String>,
    pub weight: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeColors {
    pub name: Option<String>,
    pub background: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeImage {
    pub src: Option<String>,
    pub size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeLink {
    pub href: Option<String>,
}

/// User-editable node content. Opaque to the tree rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeContent {
    pub name: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub font: NodeFont,
    pub colors: NodeColors,
    pub image: NodeImage,
    pub link: NodeLink,
    pub k: Option<f64>,
    pub locked: bool,
}

/// Persisted node record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub map_id: MapId,
    pub parent_id: Option<NodeId>,
    pub root: bool,
    pub detached: bool,
    /// Display order within the map; listings sort ascending by this value.
    pub order_number: i64,
    pub last_modified: DateTime<Utc>,
    pub content: NodeContent,
}

impl Node {
    /// Creates a root node with empty content.
    pub fn new_root(id: NodeId, map_id: MapId, last_modified: DateTime<Utc>) -> Self {
        Self {
            id,
            map_id,
            parent_id: None,
            root: true,
            detached: false,
            order_number: 0,
            last_modified,
            content: NodeContent::default(),
        }
    }

    /// Creates a node attached under `parent_id`.
    pub fn new_child(
        id: NodeId,
        map_id: MapId,
        parent_id: NodeId,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            parent_id: Some(parent_id),
            root: false,
            ..Self::new_root(id, map_id, last_modified)
        }
    }

    /// Creates a detached node outside the hierarchy.
    pub fn new_detached(id: NodeId, map_id: MapId, last_modified: DateTime<Utc>) -> Self {
        Self {
            root: false,
            detached: true,
            ..Self::new_root(id, map_id, last_modified)
        }
    }

    /// Returns whether the node violates the detached-without-parent rule.
    pub fn is_detached_with_parent(&self) -> bool {
        self.detached && self.parent_id.is_some()
    }

    /// Merges `patch` onto this node and stamps `last_modified`.
    pub fn apply_patch(&mut self, patch: NodePatch, now: DateTime<Utc>) {
        if let Some(parent_id) = patch.parent_id {
            self.parent_id = parent_id;
        }
        if let Some(root) = patch.root {
            self.root = root;
        }
        if let Some(detached) = patch.detached {
            self.detached = detached;
        }
        if let Some(order_number) = patch.order_number {
            self.order_number = order_number;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        self.last_modified = now;
    }
}

/// Partial node update addressed by `id` within one map.
///
/// `None` leaves a field untouched; `parent_id: Some(None)` clears the parent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub id: NodeId,
    pub parent_id: Option<Option<NodeId>>,
    pub root: Option<bool>,
    pub detached: Option<bool>,
    pub order_number: Option<i64>,
    pub content: Option<NodeContent>,
}

impl NodePatch {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// Descriptor for the optional root node created with a new map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RootNodeSpec {
    /// Defaults to a fresh v4 id.
    pub id: Option<NodeId>,
    pub content: NodeContent,
}

#[cfg(test)]
mod tests {
    use super::{Node, NodeContent, NodePatch};
    use crate::model::now_utc;
    use chrono::Duration;
    use uuid::Uuid;

    #[test]
    fn constructors_respect_tree_shape() {
        let map_id = Uuid::new_v4();
        let now = now_utc();
        let root = Node::new_root(Uuid::new_v4(), map_id, now);
        let child = Node::new_child(Uuid::new_v4(), map_id, root.id, now);
        let detached = Node::new_detached(Uuid::new_v4(), map_id, now);

        assert!(root.root && root.parent_id.is_none());
        assert!(!child.root && child.parent_id == Some(root.id));
        assert!(detached.detached && !detached.is_detached_with_parent());
    }

    #[test]
    fn apply_patch_merges_only_present_fields() {
        let map_id = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let before = now_utc() - Duration::days(3);
        let mut node = Node::new_child(Uuid::new_v4(), map_id, parent, before);
        node.order_number = 4;

        let mut patch = NodePatch::new(node.id);
        patch.content = Some(NodeContent {
            name: Some("renamed".to_string()),
            ..NodeContent::default()
        });
        let now = now_utc();
        node.apply_patch(patch, now);

        assert_eq!(node.parent_id, Some(parent));
        assert_eq!(node.order_number, 4);
        assert_eq!(node.content.name.as_deref(), Some("renamed"));
        assert_eq!(node.last_modified, now);
    }

    #[test]
    fn apply_patch_can_clear_parent() {
        let mut node = Node::new_child(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), now_utc());
        let mut patch = NodePatch::new(node.id);
        patch.parent_id = Some(None);
        patch.detached = Some(true);
        node.apply_patch(patch, now_utc());

        assert!(node.detached);
        assert!(!node.is_detached_with_parent());
    }
}
