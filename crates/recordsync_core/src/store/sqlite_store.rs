//! SQLite-backed local record store.
//!
//! # Invariants
//! - Reads reject invalid persisted rows as `CorruptData` instead of masking them.
//! - Writes validate every record before touching the table.

use super::{LocalStore, StoreError, StoreResult};
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::model::record::{Origin, Record};
use log::{error, info};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::time::Instant;

const RECORD_SELECT_SQL: &str = "SELECT
    id,
    remote_id,
    text,
    category,
    version,
    last_modified,
    origin
FROM records
ORDER BY position ASC";

/// Local store persisting records into the migrated `records` table.
pub struct SqliteLocalStore {
    conn: Connection,
}

impl SqliteLocalStore {
    /// Wraps an already migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    /// Opens a scratch in-memory store.
    pub fn in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Raw connection access for diagnostics and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn load_rows(&self) -> StoreResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(RECORD_SELECT_SQL)?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }

    fn write_rows(&mut self, records: &[Record]) -> StoreResult<()> {
        for record in records {
            record.validate()?;
        }

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM records;", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO records (
                    id,
                    remote_id,
                    text,
                    category,
                    version,
                    last_modified,
                    origin,
                    position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            )?;
            for (position, record) in records.iter().enumerate() {
                insert.execute(params![
                    record.id.as_str(),
                    record.remote_id.as_deref(),
                    record.text.as_str(),
                    record.category.as_str(),
                    i64::from(record.version),
                    record.last_modified,
                    origin_to_db(record.origin),
                    i64::try_from(position).unwrap_or(i64::MAX),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl LocalStore for SqliteLocalStore {
    fn load(&self) -> StoreResult<Vec<Record>> {
        let started_at = Instant::now();
        match self.load_rows() {
            Ok(records) => {
                info!(
                    "event=store_load module=store status=ok count={} duration_ms={}",
                    records.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(records)
            }
            Err(err) => {
                error!(
                    "event=store_load module=store status=error duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn save(&mut self, records: &[Record]) -> StoreResult<()> {
        let started_at = Instant::now();
        match self.write_rows(records) {
            Ok(()) => {
                info!(
                    "event=store_save module=store status=ok count={} duration_ms={}",
                    records.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=store_save module=store status=error count={} duration_ms={} error={err}",
                    records.len(),
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }
}

fn parse_record_row(row: &Row<'_>) -> StoreResult<Record> {
    let id: String = row.get("id").map_err(corrupt_column)?;

    let version_value: i64 = row.get("version").map_err(corrupt_column)?;
    let version = u32::try_from(version_value).map_err(|_| {
        StoreError::CorruptData(format!(
            "invalid version `{version_value}` in records.version for `{id}`"
        ))
    })?;

    let origin_text: String = row.get("origin").map_err(corrupt_column)?;
    let origin = parse_origin(&origin_text).ok_or_else(|| {
        StoreError::CorruptData(format!(
            "invalid origin `{origin_text}` in records.origin for `{id}`"
        ))
    })?;

    let record = Record {
        remote_id: row.get("remote_id").map_err(corrupt_column)?,
        text: row.get("text").map_err(corrupt_column)?,
        category: row.get("category").map_err(corrupt_column)?,
        version,
        last_modified: row.get("last_modified").map_err(corrupt_column)?,
        origin,
        id,
    };
    record
        .validate()
        .map_err(|err| StoreError::CorruptData(format!("record `{}`: {err}", record.id)))?;
    Ok(record)
}

fn corrupt_column(err: rusqlite::Error) -> StoreError {
    StoreError::CorruptData(err.to_string())
}

fn origin_to_db(origin: Origin) -> &'static str {
    match origin {
        Origin::Local => "local",
        Origin::Remote => "remote",
    }
}

fn parse_origin(value: &str) -> Option<Origin> {
    match value {
        "local" => Some(Origin::Local),
        "remote" => Some(Origin::Remote),
        _ => None,
    }
}
