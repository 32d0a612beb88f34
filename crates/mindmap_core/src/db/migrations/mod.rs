//! Embedded schema scripts for maps and nodes.
//!
//! Scripts are listed oldest first. A pending run executes inside one
//! transaction and bumps `PRAGMA user_version` after each script, so a
//! failure leaves the file at its previous version.

use crate::db::{schema_version, DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "maps_nodes",
        sql: include_str!("0001_maps_nodes.sql"),
    },
    Migration {
        version: 2,
        name: "node_recency_index",
        sql: include_str!("0002_node_recency_index.sql"),
    },
];

/// Schema version produced by running every embedded script.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Runs the scripts newer than the connection's schema.
///
/// Returns the number of scripts applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let found = schema_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::UnsupportedSchemaVersion { found, supported });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > found)
        .collect();
    if pending.is_empty() {
        return Ok(0);
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        tx.execute_batch(migration.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", migration.version))
            .map_err(|source| DbError::MigrationFailed {
                version: migration.version,
                name: migration.name,
                source,
            })?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    tx.commit()?;

    Ok(pending.len())
}
