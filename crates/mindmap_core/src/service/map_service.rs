//! Map orchestration service.
//!
//! # Responsibility
//! - Resolve maps by client-supplied UUID strings.
//! - Gate node inserts through the tree validator.
//! - Rebuild a map's node set atomically from a client payload.
//! - Compute deletion deadlines and run the outdated-map sweep.
//!
//! # Invariants
//! - Malformed UUID strings are rejected before any storage access.
//! - Batch inserts run strictly in submission order; a node whose parent is
//!   neither present nor inserted earlier in the batch is skipped and logged.
//! - Insertion assigns `order_number`, so display order follows insert order.
//! - Every node mutation refreshes the stored `deleted_at` in the same
//!   transaction; option updates and rebuilds also stamp the map's own
//!   `last_modified`.

use crate::config::RetentionSettings;
use crate::model::client::{ClientMap, ClientNode};
use crate::model::ids::{parse_uuid, InvalidUuid};
use crate::model::map::{Map, MapId, MapOptions};
use crate::model::node::{Node, NodeId, NodePatch, RootNodeSpec};
use crate::model::now_utc;
use crate::repo::map_repo::MapRepository;
use crate::repo::node_repo::NodeRepository;
use crate::repo::RepoError;
use crate::retention::{deletion_deadline, map_deletion_deadline, retention_reference};
use crate::service::tree_validator;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors from map service operations.
#[derive(Debug)]
pub enum MapServiceError {
    /// Identifier string is not a canonical UUID.
    MalformedUuid(InvalidUuid),
    /// Referenced map does not exist.
    MapNotFound(MapId),
    /// Referenced node does not exist in the given map.
    NodeNotFound { map_id: MapId, node_id: NodeId },
    /// A required identifier was nil.
    MissingArgument(&'static str),
    /// Detached node declares a parent.
    DetachedWithParent(NodeId),
    /// Node is not a root, not detached, and its parent is not in the map.
    InvalidTreeReference {
        map_id: MapId,
        node_id: NodeId,
        parent_id: Option<NodeId>,
    },
    /// Storage-level failure.
    Repo(RepoError),
}

impl Display for MapServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedUuid(err) => write!(f, "{err}"),
            Self::MapNotFound(id) => write!(f, "map not found: {id}"),
            Self::NodeNotFound { map_id, node_id } => {
                write!(f, "node {node_id} not found in map {map_id}")
            }
            Self::MissingArgument(name) => write!(f, "missing required argument `{name}`"),
            Self::DetachedWithParent(id) => {
                write!(f, "detached node {id} must not declare a parent")
            }
            Self::InvalidTreeReference {
                map_id,
                node_id,
                parent_id,
            } => match parent_id {
                Some(parent_id) => write!(
                    f,
                    "parent {parent_id} of node {node_id} does not exist in map {map_id}"
                ),
                None => write!(
                    f,
                    "node {node_id} in map {map_id} is neither root, detached, nor parented"
                ),
            },
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for MapServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedUuid(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MapServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::MapNotFound(map_id) => Self::MapNotFound(map_id),
            RepoError::NodeNotFound { map_id, node_id } => Self::NodeNotFound { map_id, node_id },
            other => Self::Repo(other),
        }
    }
}

pub type MapServiceResult<T> = Result<T, MapServiceError>;

/// Map use-case facade over map and node repositories.
pub struct MapService<M: MapRepository, N: NodeRepository, S: RetentionSettings> {
    maps: M,
    nodes: N,
    settings: S,
}

impl<M: MapRepository, N: NodeRepository, S: RetentionSettings> MapService<M, N, S> {
    pub fn new(maps: M, nodes: N, settings: S) -> Self {
        Self {
            maps,
            nodes,
            settings,
        }
    }

    /// Configured retention window in days.
    pub fn delete_after_days(&self) -> u32 {
        self.settings.delete_after_days()
    }

    /// Loads a map by UUID string; `Ok(None)` when it does not exist.
    pub fn find_map(&self, uuid: &str) -> MapServiceResult<Option<Map>> {
        let map_id = parse_map_uuid(uuid)?;
        Ok(self.maps.get_map(map_id)?)
    }

    /// Assembles the client view: metadata, ordered nodes, deadline, window.
    pub fn export_map_to_client(&self, uuid: &str) -> MapServiceResult<ClientMap> {
        let map_id = parse_map_uuid(uuid)?;
        let map = self
            .maps
            .get_map(map_id)?
            .ok_or(MapServiceError::MapNotFound(map_id))?;
        let nodes = self.nodes.list_nodes(map_id)?;
        let retention_days = self.delete_after_days();

        Ok(ClientMap {
            uuid: map.id.to_string(),
            last_modified: Some(map.last_modified),
            deleted_at: Some(map_deletion_deadline(&map, &nodes, retention_days)),
            delete_after_days: Some(retention_days),
            data: nodes.iter().map(ClientNode::from).collect(),
            options: map.options,
        })
    }

    /// Deletion deadline for a stored map, measured from its newest node.
    pub fn map_deleted_at(&self, map_id: MapId) -> MapServiceResult<DateTime<Utc>> {
        let map = self
            .maps
            .get_map(map_id)?
            .ok_or(MapServiceError::MapNotFound(map_id))?;
        let newest = self.nodes.newest_modification(map_id)?;
        Ok(deletion_deadline(
            retention_reference(&map, newest),
            self.delete_after_days(),
        ))
    }

    /// Creates a new map, optionally with one root node.
    pub fn create_empty_map(&self, root: Option<RootNodeSpec>) -> MapServiceResult<Map> {
        let now = now_utc();
        let retention_days = self.delete_after_days();
        let mut map = Map::new(now);
        map.delete_after_days = Some(retention_days);
        map.deleted_at = Some(deletion_deadline(now, retention_days));

        self.maps.in_transaction(|| {
            let created = self.maps.create_map(&map)?;
            if let Some(root) = root {
                let mut node = Node::new_root(root.id.unwrap_or_else(Uuid::new_v4), created.id, now);
                node.content = root.content;
                self.persist_node(created.id, node)?;
            }
            Ok(created)
        })
    }

    /// Overwrites the map's display options and marks the map as modified.
    pub fn update_map_options(
        &self,
        map_id: MapId,
        options: MapOptions,
    ) -> MapServiceResult<Option<Map>> {
        if map_id.is_nil() {
            return Err(MapServiceError::MissingArgument("map_id"));
        }
        self.maps.in_transaction(|| {
            if self
                .maps
                .update_options(map_id, &options, now_utc())?
                .is_none()
            {
                return Ok(None);
            }
            self.refresh_deleted_at(map_id)?;
            Ok(self.maps.get_map(map_id)?)
        })
    }

    /// Deletes a map and all of its nodes. Absent maps are not an error.
    pub fn delete_map(&self, uuid: &str) -> MapServiceResult<()> {
        let map_id = parse_map_uuid(uuid)?;
        self.maps.delete_map(map_id)?;
        info!("event=map_delete module=map_service status=ok map_id={map_id}");
        Ok(())
    }

    /// Deletes every map idle for longer than `retention_days`.
    pub fn delete_outdated_maps(&self, retention_days: u32) -> MapServiceResult<usize> {
        let deleted = self.maps.delete_outdated(retention_days, now_utc())?;
        info!(
            "event=map_sweep module=map_service status=ok retention_days={retention_days} deleted={deleted}"
        );
        Ok(deleted)
    }

    /// Sweep using the configured retention window.
    pub fn delete_outdated_maps_with_configured_window(&self) -> MapServiceResult<usize> {
        self.delete_outdated_maps(self.delete_after_days())
    }

    /// Inserts one node; returns the existing record if the id is taken.
    pub fn add_node(&self, map_id: MapId, node: Node) -> MapServiceResult<Node> {
        if map_id.is_nil() {
            return Err(MapServiceError::MissingArgument("map_id"));
        }
        if node.id.is_nil() {
            return Err(MapServiceError::MissingArgument("node.id"));
        }
        if node.is_detached_with_parent() {
            return Err(MapServiceError::DetachedWithParent(node.id));
        }
        self.ensure_map_exists(map_id)?;

        if let Some(existing) = self.nodes.get_node(map_id, node.id)? {
            return Ok(existing);
        }
        if !tree_validator::is_parent_satisfied(&self.nodes, map_id, &node)? {
            return Err(MapServiceError::InvalidTreeReference {
                map_id,
                node_id: node.id,
                parent_id: node.parent_id,
            });
        }
        self.maps.in_transaction(|| {
            let inserted = self.persist_node(map_id, node)?;
            self.refresh_deleted_at(map_id)?;
            Ok(inserted)
        })
    }

    /// Inserts nodes in order, skipping those whose parent is unresolved.
    ///
    /// Returns only the nodes actually inserted, in processing order.
    pub fn add_nodes(&self, map_id: MapId, nodes: Vec<Node>) -> MapServiceResult<Vec<Node>> {
        if map_id.is_nil() {
            return Err(MapServiceError::MissingArgument("map_id"));
        }
        self.ensure_map_exists(map_id)?;
        self.maps.in_transaction(|| {
            let inserted = self.insert_in_order(map_id, nodes)?;
            if !inserted.is_empty() {
                self.refresh_deleted_at(map_id)?;
            }
            Ok(inserted)
        })
    }

    /// Converts client nodes and inserts them as one ordered batch.
    ///
    /// Nodes with malformed ids or a detached-with-parent shape are skipped.
    pub fn add_nodes_from_client(
        &self,
        map_id: MapId,
        client_nodes: &[ClientNode],
    ) -> MapServiceResult<Vec<Node>> {
        let nodes = convert_client_nodes(map_id, client_nodes);
        self.add_nodes(map_id, nodes)
    }

    /// Lists a map's nodes by ascending display order.
    pub fn find_nodes(&self, map_id: MapId) -> MapServiceResult<Vec<Node>> {
        Ok(self.nodes.list_nodes(map_id)?)
    }

    /// Existence probe scoped by map; nil ids yield `false`.
    pub fn node_exists(&self, map_id: MapId, node_id: NodeId) -> MapServiceResult<bool> {
        Ok(tree_validator::node_exists(&self.nodes, map_id, node_id)?)
    }

    /// Merges `patch` onto the stored node and stamps `last_modified`.
    pub fn update_node(&self, map_id: MapId, patch: NodePatch) -> MapServiceResult<Node> {
        let node_id = patch.id;
        let mut node = self
            .nodes
            .get_node(map_id, node_id)?
            .ok_or(MapServiceError::NodeNotFound { map_id, node_id })?;
        node.apply_patch(patch, now_utc());
        if node.is_detached_with_parent() {
            return Err(MapServiceError::DetachedWithParent(node_id));
        }
        self.maps.in_transaction(|| {
            let updated = self.nodes.update_node(&node)?;
            self.refresh_deleted_at(map_id)?;
            Ok(updated)
        })
    }

    /// Deletes one node; `Ok(None)` when nothing matched.
    pub fn remove_node(&self, node_id: NodeId, map_id: MapId) -> MapServiceResult<Option<Node>> {
        self.maps.in_transaction(|| {
            let removed = self.nodes.delete_node(map_id, node_id)?;
            if removed.is_some() {
                self.refresh_deleted_at(map_id)?;
            }
            Ok(removed)
        })
    }

    /// Replaces a map's whole node set with the client's, atomically.
    ///
    /// Returns `Ok(None)` when the map does not exist.
    pub fn update_map(&self, client_map: &ClientMap) -> MapServiceResult<Option<Map>> {
        let map_id = parse_map_uuid(&client_map.uuid)?;
        if self.maps.get_map(map_id)?.is_none() {
            return Ok(None);
        }
        let nodes = convert_client_nodes(map_id, &client_map.data);

        self.maps.in_transaction(|| {
            let removed = self.nodes.delete_nodes_of_map(map_id)?;
            let inserted = self.insert_in_order(map_id, nodes)?;
            self.maps.touch_map(map_id, now_utc())?;
            self.refresh_deleted_at(map_id)?;
            debug!(
                "event=map_rebuild module=map_service status=ok map_id={map_id} removed={removed} inserted={}",
                inserted.len()
            );
            Ok::<_, MapServiceError>(())
        })?;

        Ok(self.maps.get_map(map_id)?)
    }

    fn refresh_deleted_at(&self, map_id: MapId) -> MapServiceResult<()> {
        let deadline = self.map_deleted_at(map_id)?;
        self.maps.set_deleted_at(map_id, deadline)?;
        Ok(())
    }

    fn ensure_map_exists(&self, map_id: MapId) -> MapServiceResult<()> {
        match self.maps.get_map(map_id)? {
            Some(_) => Ok(()),
            None => Err(MapServiceError::MapNotFound(map_id)),
        }
    }

    fn insert_in_order(&self, map_id: MapId, nodes: Vec<Node>) -> MapServiceResult<Vec<Node>> {
        let mut inserted = Vec::with_capacity(nodes.len());
        for node in nodes {
            if node.is_detached_with_parent() {
                warn!(
                    "event=node_skipped module=map_service status=warn reason=detached_with_parent map_id={map_id} node_id={}",
                    node.id
                );
                continue;
            }
            if self.nodes.node_exists(map_id, node.id)? {
                debug!(
                    "event=node_skipped module=map_service status=ok reason=duplicate map_id={map_id} node_id={}",
                    node.id
                );
                continue;
            }
            if !tree_validator::is_parent_satisfied(&self.nodes, map_id, &node)? {
                warn!(
                    "event=node_skipped module=map_service status=warn reason=missing_parent map_id={map_id} node_id={} parent_id={}",
                    node.id,
                    node.parent_id
                        .map_or_else(|| "none".to_string(), |id| id.to_string())
                );
                continue;
            }
            inserted.push(self.persist_node(map_id, node)?);
        }
        Ok(inserted)
    }

    fn persist_node(&self, map_id: MapId, mut node: Node) -> MapServiceResult<Node> {
        node.map_id = map_id;
        node.order_number = self.nodes.next_order_number(map_id)?;
        Ok(self.nodes.insert_node(&node)?)
    }
}

fn parse_map_uuid(uuid: &str) -> MapServiceResult<MapId> {
    parse_uuid(uuid).ok_or_else(|| MapServiceError::MalformedUuid(InvalidUuid(uuid.to_string())))
}

fn convert_client_nodes(map_id: MapId, client_nodes: &[ClientNode]) -> Vec<Node> {
    let now = now_utc();
    client_nodes
        .iter()
        .filter_map(|client| match client.to_node(map_id, now) {
            Ok(node) => Some(node),
            Err(err) => {
                warn!(
                    "event=node_skipped module=map_service status=warn reason=invalid_client_node map_id={map_id} error={err}"
                );
                None
            }
        })
        .collect()
}
