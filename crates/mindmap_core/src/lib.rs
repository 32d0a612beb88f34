//! Persistence and tree-integrity core for collaborative mind maps.
//! This crate is the single source of truth for map/node storage rules.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod retention;
pub mod service;

pub use config::{ConfigError, CoreConfig, RetentionSettings};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig};
pub use model::client::{ClientMap, ClientNode, ClientNodeError};
pub use model::ids::InvalidUuid;
pub use model::map::{AdminMapEntry, Map, MapId, MapOptions};
pub use model::node::{
    Coordinates, Node, NodeColors, NodeContent, NodeFont, NodeId, NodeImage, NodeLink, NodePatch,
    RootNodeSpec,
};
pub use repo::map_repo::{MapRepository, SqliteMapRepository};
pub use repo::node_repo::{NodeRepository, SqliteNodeRepository};
pub use repo::{RepoError, RepoResult};
pub use retention::{deletion_deadline, map_deletion_deadline};
pub use service::map_service::{MapService, MapServiceError, MapServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
