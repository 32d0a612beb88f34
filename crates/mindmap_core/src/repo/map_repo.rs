//! Map repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist map rows (metadata, retention fields, options).
//! - Run the set-based outdated-map sweep.
//! - Provide one atomic scope spanning map and node writes.
//!
//! # Invariants
//! - Deleting a map cascades to its nodes through the foreign key.
//! - A map is outdated when its newest node (or, for an empty map, the map
//!   row itself) was last modified before `now - retention_days`.

use crate::model::map::{Map, MapId, MapOptions};
use crate::repo::{
    ensure_schema_ready, parse_epoch_ms, parse_uuid_column, to_epoch_ms, RepoError, RepoResult,
};
use chrono::{DateTime, Days, Utc};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const MAP_SELECT_SQL: &str = "SELECT
    id,
    last_modified,
    data,
    delete_after_days,
    deleted_at,
    options
FROM maps";

const MAP_COLUMNS: &[&str] = &[
    "id",
    "last_modified",
    "data",
    "delete_after_days",
    "deleted_at",
    "options",
];

/// Repository interface for map rows.
pub trait MapRepository {
    /// Inserts a new map row and returns it as stored.
    fn create_map(&self, map: &Map) -> RepoResult<Map>;
    /// Loads one map by id.
    fn get_map(&self, map_id: MapId) -> RepoResult<Option<Map>>;
    /// Overwrites the options, stamps `last_modified`, returns the refreshed row.
    fn update_options(
        &self,
        map_id: MapId,
        options: &MapOptions,
        modified_at: DateTime<Utc>,
    ) -> RepoResult<Option<Map>>;
    /// Stamps the map's own `last_modified`.
    fn touch_map(&self, map_id: MapId, modified_at: DateTime<Utc>) -> RepoResult<()>;
    /// Records the latest computed deletion deadline.
    fn set_deleted_at(&self, map_id: MapId, deleted_at: DateTime<Utc>) -> RepoResult<()>;
    /// Deletes one map and, by cascade, its nodes. Missing rows are ignored.
    fn delete_map(&self, map_id: MapId) -> RepoResult<()>;
    /// Deletes every map past its retention deadline; returns the count.
    fn delete_outdated(&self, retention_days: u32, now: DateTime<Utc>) -> RepoResult<usize>;
    /// Runs `work` inside one immediate transaction, rolling back on error.
    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed map repository.
pub struct SqliteMapRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMapRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn, "maps", MAP_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl MapRepository for SqliteMapRepository<'_> {
    fn create_map(&self, map: &Map) -> RepoResult<Map> {
        self.conn.execute(
            "INSERT INTO maps (
                id,
                last_modified,
                data,
                delete_after_days,
                deleted_at,
                options
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                map.id.to_string(),
                to_epoch_ms(map.last_modified),
                map.data.as_ref().map(encode_json).transpose()?,
                map.delete_after_days,
                map.deleted_at.map(to_epoch_ms),
                encode_json(&map.options)?,
            ],
        )?;
        self.get_map(map.id)?.ok_or(RepoError::MapNotFound(map.id))
    }

    fn get_map(&self, map_id: MapId) -> RepoResult<Option<Map>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MAP_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([map_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_map_row(row)?));
        }
        Ok(None)
    }

    fn update_options(
        &self,
        map_id: MapId,
        options: &MapOptions,
        modified_at: DateTime<Utc>,
    ) -> RepoResult<Option<Map>> {
        self.conn.execute(
            "UPDATE maps SET options = ?2, last_modified = ?3 WHERE id = ?1;",
            params![
                map_id.to_string(),
                encode_json(options)?,
                to_epoch_ms(modified_at)
            ],
        )?;
        self.get_map(map_id)
    }

    fn touch_map(&self, map_id: MapId, modified_at: DateTime<Utc>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE maps SET last_modified = ?2 WHERE id = ?1;",
            params![map_id.to_string(), to_epoch_ms(modified_at)],
        )?;
        if changed == 0 {
            return Err(RepoError::MapNotFound(map_id));
        }
        Ok(())
    }

    fn set_deleted_at(&self, map_id: MapId, deleted_at: DateTime<Utc>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE maps SET deleted_at = ?2 WHERE id = ?1;",
            params![map_id.to_string(), to_epoch_ms(deleted_at)],
        )?;
        if changed == 0 {
            return Err(RepoError::MapNotFound(map_id));
        }
        Ok(())
    }

    fn delete_map(&self, map_id: MapId) -> RepoResult<()> {
        self.conn
            .execute("DELETE FROM maps WHERE id = ?1;", [map_id.to_string()])?;
        Ok(())
    }

    fn delete_outdated(&self, retention_days: u32, now: DateTime<Utc>) -> RepoResult<usize> {
        // reference + days < now  <=>  reference < now - days
        let cutoff = now
            .checked_sub_days(Days::new(u64::from(retention_days)))
            .ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "retention window of {retention_days} days is out of range"
                ))
            })?;

        let deleted = self.conn.execute(
            "DELETE FROM maps
             WHERE id IN (
                SELECT m.id
                FROM maps m
                LEFT JOIN (
                    SELECT map_id, MAX(last_modified) AS newest
                    FROM nodes
                    GROUP BY map_id
                ) latest ON latest.map_id = m.id
                WHERE (latest.newest IS NOT NULL AND latest.newest < ?1)
                   OR (latest.newest IS NULL AND m.last_modified < ?1)
             );",
            [to_epoch_ms(cutoff)],
        )?;
        Ok(deleted)
    }

    fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepoError>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let value = work()?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }
}

fn parse_map_row(row: &Row<'_>) -> RepoResult<Map> {
    let id_text: String = row.get("id")?;
    let data = row
        .get::<_, Option<String>>("data")?
        .map(|text| decode_json(&text, "maps.data"))
        .transpose()?;
    let options_text: String = row.get("options")?;

    Ok(Map {
        id: parse_uuid_column(&id_text, "maps.id")?,
        last_modified: parse_epoch_ms(row.get("last_modified")?, "maps.last_modified")?,
        data,
        delete_after_days: row.get("delete_after_days")?,
        deleted_at: row
            .get::<_, Option<i64>>("deleted_at")?
            .map(|value| parse_epoch_ms(value, "maps.deleted_at"))
            .transpose()?,
        options: decode_json(&options_text, "maps.options")?,
    })
}

fn encode_json<T: serde::Serialize>(value: &T) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode json column: {err}")))
}

fn decode_json<T: serde::de::DeserializeOwned>(text: &str, column: &'static str) -> RepoResult<T> {
    serde_json::from_str(text)
        .map_err(|err| RepoError::InvalidData(format!("invalid json in {column}: {err}")))
}
