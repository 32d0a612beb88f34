//! Client payload shapes exchanged with the HTTP and real-time layers.
//!
//! # Responsibility
//! - Describe the JSON the web client sends and receives (camelCase).
//! - Convert client nodes into persisted [`Node`] records, validating ids
//!   at ingestion.
//!
//! # Invariants
//! - An empty `parent` string means "no parent".
//! - Detached client nodes must not name a parent.

use crate::model::ids::{parse_optional_uuid, parse_uuid, InvalidUuid};
use crate::model::map::{MapId, MapOptions};
use crate::model::node::{Node, NodeContent, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Node as exchanged with the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientNode {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub is_root: bool,
    #[serde(default)]
    pub detached: bool,
    #[serde(flatten)]
    pub content: NodeContent,
}

/// Map as exchanged with the client: metadata plus ordered nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMap {
    pub uuid: String,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delete_after_days: Option<u32>,
    #[serde(default)]
    pub data: Vec<ClientNode>,
    #[serde(default)]
    pub options: MapOptions,
}

/// Reasons a client node cannot be turned into a node record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientNodeError {
    MalformedId(InvalidUuid),
    MalformedParent {
        node_id: NodeId,
        source: InvalidUuid,
    },
    DetachedWithParent(NodeId),
}

impl Display for ClientNodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedId(err) => write!(f, "invalid node id: {err}"),
            Self::MalformedParent { node_id, source } => {
                write!(f, "invalid parent for node {node_id}: {source}")
            }
            Self::DetachedWithParent(id) => {
                write!(f, "detached node {id} must not declare a parent")
            }
        }
    }
}

impl Error for ClientNodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::MalformedId(err) => Some(err),
            Self::MalformedParent { source, .. } => Some(source),
            Self::DetachedWithParent(_) => None,
        }
    }
}

impl ClientNode {
    /// Builds the node record owned by `map_id`.
    ///
    /// `order_number` is left at zero; insertion assigns the display order.
    pub fn to_node(&self, map_id: MapId, now: DateTime<Utc>) -> Result<Node, ClientNodeError> {
        let id = parse_uuid(self.id.trim())
            .ok_or_else(|| ClientNodeError::MalformedId(InvalidUuid(self.id.clone())))?;
        let parent_id = parse_optional_uuid(self.parent.as_deref())
            .map_err(|source| ClientNodeError::MalformedParent { node_id: id, source })?;
        if self.detached && parent_id.is_some() {
            return Err(ClientNodeError::DetachedWithParent(id));
        }

        Ok(Node {
            id,
            map_id,
            parent_id,
            root: self.is_root,
            detached: self.detached,
            order_number: 0,
            last_modified: now,
            content: self.content.clone(),
        })
    }
}

impl From<&Node> for ClientNode {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.to_string(),
            parent: node.parent_id.map(|id| id.to_string()),
            is_root: node.root,
            detached: node.detached,
            content: node.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientMap, ClientNode, ClientNodeError};
    use crate::model::now_utc;
    use uuid::Uuid;

    #[test]
    fn deserializes_web_client_payload() {
        let payload = r##"{
            "uuid": "3b2f7c1a-6d4e-4f5a-9b8c-7d6e5f4a3b2c",
            "data": [
                {
                    "id": "0a6c1f0e-52b7-4d69-9d8a-2f3e4b5c6d7e",
                    "parent": "",
                    "isRoot": true,
                    "name": "Root",
                    "coordinates": { "x": 0.0, "y": 0.0 },
                    "font": { "size": 22, "weight": "bold" },
                    "colors": { "branch": "#333" },
                    "locked": false
                }
            ],
            "options": { "fontMaxSize": 60, "fontMinSize": 10, "fontIncrement": 2 }
        }"##;

        let map: ClientMap = serde_json::from_str(payload).expect("payload should parse");
        assert_eq!(map.data.len(), 1);
        assert!(map.data[0].is_root);
        assert_eq!(map.data[0].content.name.as_deref(), Some("Root"));
        assert_eq!(map.data[0].content.font.size, Some(22));
        assert_eq!(map.options.font_max_size, 60);
        assert!(map.deleted_at.is_none());
    }

    #[test]
    fn to_node_treats_empty_parent_as_none() {
        let client = ClientNode {
            id: Uuid::new_v4().to_string(),
            parent: Some(String::new()),
            is_root: true,
            ..ClientNode::default()
        };
        let node = client
            .to_node(Uuid::new_v4(), now_utc())
            .expect("root should convert");
        assert!(node.root);
        assert!(node.parent_id.is_none());
    }

    #[test]
    fn to_node_rejects_detached_with_parent() {
        let id = Uuid::new_v4();
        let client = ClientNode {
            id: id.to_string(),
            parent: Some(Uuid::new_v4().to_string()),
            detached: true,
            ..ClientNode::default()
        };
        let err = client.to_node(Uuid::new_v4(), now_utc()).unwrap_err();
        assert_eq!(err, ClientNodeError::DetachedWithParent(id));
    }

    #[test]
    fn to_node_rejects_malformed_ids() {
        let client = ClientNode {
            id: "node-1".to_string(),
            ..ClientNode::default()
        };
        assert!(matches!(
            client.to_node(Uuid::new_v4(), now_utc()),
            Err(ClientNodeError::MalformedId(_))
        ));
    }
}
