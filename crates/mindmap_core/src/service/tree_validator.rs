//! Parent-reference checks for nodes entering a map.
//!
//! A node is accepted when it is a root, when it is detached, or when its
//! parent already exists in the same map. Validity is only checked at
//! insertion; later parent removal does not re-validate children.

use crate::model::map::MapId;
use crate::model::node::{Node, NodeId};
use crate::repo::node_repo::NodeRepository;
use crate::repo::RepoResult;

/// Existence probe scoped by map. Nil identifiers never match.
pub fn node_exists<N: NodeRepository>(
    nodes: &N,
    map_id: MapId,
    node_id: NodeId,
) -> RepoResult<bool> {
    if map_id.is_nil() || node_id.is_nil() {
        return Ok(false);
    }
    nodes.node_exists(map_id, node_id)
}

/// Returns whether `node` may be inserted into `map_id` right now.
pub fn is_parent_satisfied<N: NodeRepository>(
    nodes: &N,
    map_id: MapId,
    node: &Node,
) -> RepoResult<bool> {
    if node.root || node.detached {
        return Ok(true);
    }
    match node.parent_id {
        Some(parent_id) => node_exists(nodes, map_id, parent_id),
        None => Ok(false),
    }
}
