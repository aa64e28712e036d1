//! Schema migrations
//!
//! SQL migrations are embedded as strings and executed when a database is opened.

use rusqlite::Connection;

use crate::error::Result;

/// Record table SQL (001)
pub const RECORD_TABLES_SQL: &str = include_str!("001_records.sql");

/// Run all migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(RECORD_TABLES_SQL)?;
    Ok(())
}
