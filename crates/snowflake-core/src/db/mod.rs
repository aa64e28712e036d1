//! Durable record storage.
//!
//! Records are JSON bodies keyed by `(project, kind, key)`. Every write is
//! all-or-nothing: bodies are serialized before a transaction is opened, and
//! multi-record writes commit in one SQLite transaction. Cache invalidation is
//! the caller's job, not the store's.

pub mod migrations;

use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Kind of record held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Metadata,
    Character,
    Scene,
    StageOutput,
    ScenePlan,
    SceneDraft,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Metadata => "metadata",
            Self::Character => "character",
            Self::Scene => "scene",
            Self::StageOutput => "stage_output",
            Self::ScenePlan => "scene_plan",
            Self::SceneDraft => "scene_draft",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One keyed record write inside a batch.
#[derive(Debug, Clone)]
pub struct RecordWrite {
    pub kind: RecordKind,
    pub key: String,
    pub body: Value,
}

impl RecordWrite {
    pub fn new(kind: RecordKind, key: impl Into<String>, body: Value) -> Self {
        Self {
            kind,
            key: key.into(),
            body,
        }
    }
}

/// Persistence contract used by the engine.
///
/// Implementations must leave the previous state intact when a call fails.
pub trait RecordStore: Send + Sync {
    /// Read one record.
    fn read(&self, project_id: &str, kind: RecordKind, key: &str) -> Result<Option<Value>>;

    /// Read every record of a kind, in collection order.
    fn read_collection(&self, project_id: &str, kind: RecordKind) -> Result<Vec<(String, Value)>>;

    /// Replace a set of records in one atomic step.
    fn write_batch(&self, project_id: &str, writes: &[RecordWrite]) -> Result<()>;

    /// Replace every record of a kind with `records`, in order, and apply
    /// `writes` in the same atomic step.
    fn replace_collection(
        &self,
        project_id: &str,
        kind: RecordKind,
        records: &[(String, Value)],
        writes: &[RecordWrite],
    ) -> Result<()>;

    /// Ids of every project with a metadata record.
    fn list_project_ids(&self) -> Result<Vec<String>>;

    /// Replace every record of a kind with `records`, in order.
    fn write_collection(
        &self,
        project_id: &str,
        kind: RecordKind,
        records: &[(String, Value)],
    ) -> Result<()> {
        self.replace_collection(project_id, kind, records, &[])
    }

    /// Replace one record.
    fn write(&self, project_id: &str, kind: RecordKind, key: &str, record: &Value) -> Result<()> {
        self.write_batch(project_id, &[RecordWrite::new(kind, key, record.clone())])
    }
}

/// SQLite-backed record store.
///
/// Thread-safe via internal Mutex. All database operations acquire the lock.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) the database at `path` and apply migrations.
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(Error::Database)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::Database)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn upsert(
        tx: &Transaction<'_>,
        project_id: &str,
        kind: RecordKind,
        key: &str,
        position: i64,
        body: &str,
        now: &str,
    ) -> Result<()> {
        tx.execute(
            "INSERT INTO record (project_id, kind, record_key, position, body, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (project_id, kind, record_key)
             DO UPDATE SET position = excluded.position,
                           body = excluded.body,
                           updated_at = excluded.updated_at",
            params![project_id, kind.as_str(), key, position, body, now],
        )?;
        Ok(())
    }
}

fn parse_body(body: String) -> Result<Value> {
    Ok(serde_json::from_str(&body)?)
}

impl RecordStore for Database {
    fn read(&self, project_id: &str, kind: RecordKind, key: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM record
                 WHERE project_id = ?1 AND kind = ?2 AND record_key = ?3",
                params![project_id, kind.as_str(), key],
                |row| row.get(0),
            )
            .optional()?;
        body.map(parse_body).transpose()
    }

    fn read_collection(&self, project_id: &str, kind: RecordKind) -> Result<Vec<(String, Value)>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT record_key, body FROM record
             WHERE project_id = ?1 AND kind = ?2
             ORDER BY position, record_key",
        )?;
        let rows = stmt
            .query_map(params![project_id, kind.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, body)| Ok((key, parse_body(body)?)))
            .collect()
    }

    fn write_batch(&self, project_id: &str, writes: &[RecordWrite]) -> Result<()> {
        let bodies = writes
            .iter()
            .map(|w| serde_json::to_string(&w.body))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let now = Utc::now().to_rfc3339();

        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let tx = conn.transaction()?;
        for (write, body) in writes.iter().zip(&bodies) {
            Self::upsert(&tx, project_id, write.kind, &write.key, 0, body, &now)?;
        }
        tx.commit()?;

        debug!(project_id, records = writes.len(), "Committed record batch");
        Ok(())
    }

    fn replace_collection(
        &self,
        project_id: &str,
        kind: RecordKind,
        records: &[(String, Value)],
        writes: &[RecordWrite],
    ) -> Result<()> {
        let bodies = records
            .iter()
            .map(|(_, body)| serde_json::to_string(body))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let extra = writes
            .iter()
            .map(|w| serde_json::to_string(&w.body))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let now = Utc::now().to_rfc3339();

        let mut conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM record WHERE project_id = ?1 AND kind = ?2",
            params![project_id, kind.as_str()],
        )?;
        for (position, ((key, _), body)) in records.iter().zip(&bodies).enumerate() {
            Self::upsert(&tx, project_id, kind, key, position as i64, body, &now)?;
        }
        for (write, body) in writes.iter().zip(&extra) {
            Self::upsert(&tx, project_id, write.kind, &write.key, 0, body, &now)?;
        }
        tx.commit()?;

        debug!(project_id, %kind, records = records.len(), "Replaced record collection");
        Ok(())
    }

    fn list_project_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().map_err(|_| Error::LockPoisoned)?;
        let mut stmt = conn.prepare(
            "SELECT project_id FROM record WHERE kind = ?1 ORDER BY project_id",
        )?;
        let ids = stmt
            .query_map(params![RecordKind::Metadata.as_str()], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}
