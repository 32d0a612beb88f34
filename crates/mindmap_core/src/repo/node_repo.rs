//! Node repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist node rows scoped by owning map.
//! - Serve ordered listings and recency lookups for retention.
//!
//! # Invariants
//! - Every query is scoped by `map_id`; node ids are only unique per map.
//! - Listings are deterministic: `order_number ASC, id ASC`.
//! - Tree rules are enforced by the service; storage only rejects the
//!   detached-with-parent shape through a CHECK constraint.

use crate::model::map::MapId;
use crate::model::node::{
    Coordinates, Node, NodeColors, NodeContent, NodeFont, NodeId, NodeImage, NodeLink,
};
use crate::repo::{
    ensure_schema_ready, parse_epoch_ms, parse_flag, parse_uuid_column, to_epoch_ms, RepoError,
    RepoResult,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const NODE_SELECT_SQL: &str = "SELECT
    map_id,
    id,
    parent_id,
    root,
    detached,
    order_number,
    last_modified,
    name,
    coordinates_x,
    coordinates_y,
    font_size,
    font_style,
    font_weight,
    color_name,
    color_background,
    color_branch,
    image_src,
    image_size,
    link_href,
    k,
    locked
FROM nodes";

const NODE_COLUMNS: &[&str] = &[
    "map_id",
    "id",
    "parent_id",
    "root",
    "detached",
    "order_number",
    "last_modified",
    "name",
    "coordinates_x",
    "coordinates_y",
    "font_size",
    "font_style",
    "font_weight",
    "color_name",
    "color_background",
    "color_branch",
    "image_src",
    "image_size",
    "link_href",
    "k",
    "locked",
];

/// Repository interface for node rows.
pub trait NodeRepository {
    /// Inserts one node row and returns it as stored.
    fn insert_node(&self, node: &Node) -> RepoResult<Node>;
    /// Loads one node by `(map_id, node_id)`.
    fn get_node(&self, map_id: MapId, node_id: NodeId) -> RepoResult<Option<Node>>;
    /// Existence probe scoped by map.
    fn node_exists(&self, map_id: MapId, node_id: NodeId) -> RepoResult<bool>;
    /// Lists all nodes of a map by ascending display order.
    fn list_nodes(&self, map_id: MapId) -> RepoResult<Vec<Node>>;
    /// Overwrites every column of an existing node.
    fn update_node(&self, node: &Node) -> RepoResult<Node>;
    /// Deletes one node, returning the removed row if it existed.
    fn delete_node(&self, map_id: MapId, node_id: NodeId) -> RepoResult<Option<Node>>;
    /// Deletes every node of a map; returns the number removed.
    fn delete_nodes_of_map(&self, map_id: MapId) -> RepoResult<usize>;
    /// Newest `last_modified` across the map's nodes, if it has any.
    fn newest_modification(&self, map_id: MapId) -> RepoResult<Option<DateTime<Utc>>>;
    /// Order number that places a new node after every existing one.
    fn next_order_number(&self, map_id: MapId) -> RepoResult<i64>;
}

/// SQLite-backed node repository.
pub struct SqliteNodeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNodeRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, "nodes", NODE_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl NodeRepository for SqliteNodeRepository<'_> {
    fn insert_node(&self, node: &Node) -> RepoResult<Node> {
        let content = &node.content;
        self.conn.execute(
            "INSERT INTO nodes (
                map_id,
                id,
                parent_id,
                root,
                detached,
                order_number,
                last_modified,
                name,
                coordinates_x,
                coordinates_y,
                font_size,
                font_style,
                font_weight,
                color_name,
                color_background,
                color_branch,
                image_src,
                image_size,
                link_href,
                k,
                locked
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21
            );",
            params![
                node.map_id.to_string(),
                node.id.to_string(),
                node.parent_id.map(|id| id.to_string()),
                bool_to_int(node.root),
                bool_to_int(node.detached),
                node.order_number,
                to_epoch_ms(node.last_modified),
                content.name.as_deref(),
                content.coordinates.map(|c| c.x),
                content.coordinates.map(|c| c.y),
                content.font.size,
                content.font.style.as_deref(),
                content.font.weight.as_deref(),
                content.colors.name.as_deref(),
                content.colors.background.as_deref(),
                content.colors.branch.as_deref(),
                content.image.src.as_deref(),
                content.image.size,
                content.link.href.as_deref(),
                content.k,
                bool_to_int(content.locked),
            ],
        )?;
        self.get_node(node.map_id, node.id)?
            .ok_or(RepoError::NodeNotFound {
                map_id: node.map_id,
                node_id: node.id,
            })
    }

    fn get_node(&self, map_id: MapId, node_id: NodeId) -> RepoResult<Option<Node>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NODE_SELECT_SQL}
             WHERE map_id = ?1
               AND id = ?2;"
        ))?;
        let mut rows = stmt.query([map_id.to_string(), node_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_node_row(row)?));
        }
        Ok(None)
    }

    fn node_exists(&self, map_id: MapId, node_id: NodeId) -> RepoResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM nodes WHERE map_id = ?1 AND id = ?2;",
                [map_id.to_string(), node_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn list_nodes(&self, map_id: MapId) -> RepoResult<Vec<Node>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NODE_SELECT_SQL}
             WHERE map_id = ?1
             ORDER BY order_number ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([map_id.to_string()])?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next()? {
            nodes.push(parse_node_row(row)?);
        }
        Ok(nodes)
    }

    fn update_node(&self, node: &Node) -> RepoResult<Node> {
        let content = &node.content;
        let changed = self.conn.execute(
            "UPDATE nodes
             SET
                parent_id = ?3,
                root = ?4,
                detached = ?5,
                order_number = ?6,
                last_modified = ?7,
                name = ?8,
                coordinates_x = ?9,
                coordinates_y = ?10,
                font_size = ?11,
                font_style = ?12,
                font_weight = ?13,
                color_name = ?14,
                color_background = ?15,
                color_branch = ?16,
                image_src = ?17,
                image_size = ?18,
                link_href = ?19,
                k = ?20,
                locked = ?21
             WHERE map_id = ?1
               AND id = ?2;",
            params![
                node.map_id.to_string(),
                node.id.to_string(),
                node.parent_id.map(|id| id.to_string()),
                bool_to_int(node.root),
                bool_to_int(node.detached),
                node.order_number,
                to_epoch_ms(node.last_modified),
                content.name.as_deref(),
                content.coordinates.map(|c| c.x),
                content.coordinates.map(|c| c.y),
                content.font.size,
                content.font.style.as_deref(),
                content.font.weight.as_deref(),
                content.colors.name.as_deref(),
                content.colors.background.as_deref(),
                content.colors.branch.as_deref(),
                content.image.src.as_deref(),
                content.image.size,
                content.link.href.as_deref(),
                content.k,
                bool_to_int(content.locked),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NodeNotFound {
                map_id: node.map_id,
                node_id: node.id,
            });
        }
        self.get_node(node.map_id, node.id)?
            .ok_or(RepoError::NodeNotFound {
                map_id: node.map_id,
                node_id: node.id,
            })
    }

    fn delete_node(&self, map_id: MapId, node_id: NodeId) -> RepoResult<Option<Node>> {
        let Some(existing) = self.get_node(map_id, node_id)? else {
            return Ok(None);
        };
        self.conn.execute(
            "DELETE FROM nodes WHERE map_id = ?1 AND id = ?2;",
            [map_id.to_string(), node_id.to_string()],
        )?;
        Ok(Some(existing))
    }

    fn delete_nodes_of_map(&self, map_id: MapId) -> RepoResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM nodes WHERE map_id = ?1;", [map_id.to_string()])?;
        Ok(deleted)
    }

    fn newest_modification(&self, map_id: MapId) -> RepoResult<Option<DateTime<Utc>>> {
        let newest: Option<i64> = self.conn.query_row(
            "SELECT MAX(last_modified) FROM nodes WHERE map_id = ?1;",
            [map_id.to_string()],
            |row| row.get(0),
        )?;
        newest
            .map(|value| parse_epoch_ms(value, "nodes.last_modified"))
            .transpose()
    }

    fn next_order_number(&self, map_id: MapId) -> RepoResult<i64> {
        let next = self.conn.query_row(
            "SELECT COALESCE(MAX(order_number), -1) + 1
             FROM nodes
             WHERE map_id = ?1;",
            [map_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(next)
    }
}

fn parse_node_row(row: &Row<'_>) -> RepoResult<Node> {
    let map_id_text: String = row.get("map_id")?;
    let id_text: String = row.get("id")?;
    let parent_id = row
        .get::<_, Option<String>>("parent_id")?
        .map(|value| parse_uuid_column(&value, "nodes.parent_id"))
        .transpose()?;

    let coordinates = match (
        row.get::<_, Option<f64>>("coordinates_x")?,
        row.get::<_, Option<f64>>("coordinates_y")?,
    ) {
        (Some(x), Some(y)) => Some(Coordinates { x, y }),
        (None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "node {id_text} has only one coordinate set"
            )));
        }
    };

    Ok(Node {
        id: parse_uuid_column(&id_text, "nodes.id")?,
        map_id: parse_uuid_column(&map_id_text, "nodes.map_id")?,
        parent_id,
        root: parse_flag(row, "root")?,
        detached: parse_flag(row, "detached")?,
        order_number: row.get("order_number")?,
        last_modified: parse_epoch_ms(row.get("last_modified")?, "nodes.last_modified")?,
        content: NodeContent {
            name: row.get("name")?,
            coordinates,
            font: NodeFont {
                size: row.get("font_size")?,
                style: row.get("font_style")?,
                weight: row.get("font_weight")?,
            },
            colors: NodeColors {
                name: row.get("color_name")?,
                background: row.get("color_background")?,
                branch: row.get("color_branch")?,
            },
            image: NodeImage {
                src: row.get("image_src")?,
                size: row.get("image_size")?,
            },
            link: NodeLink {
                href: row.get("link_href")?,
            },
            k: row.get("k")?,
            locked: parse_flag(row, "locked")?,
        },
    })
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
