//! SQLite-backed record store
//!
//! The store owns every budget record, the shared reference tables
//! (geography, taxonomy, categories) and the bookkeeping tables (import log,
//! failed upstream requests, metadata). Reports read from it; imports and
//! upstream syncs write to it.
//!
//! Reference rows are get-or-created and never duplicated.

mod budget;
mod contracts;
mod places;
mod schema;
mod types;

pub use types::*;

use std::fs;
use std::path::Path;

use chrono::Utc;
use miette::{IntoDiagnostic, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

use crate::core::project::Project;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Metadata keys holding the last update of each report family
pub const META_REGIONALIZACAO: &str = "regionalizacao.last_updated";
pub const META_MOSAICO: &str = "mosaico.last_updated";
pub const META_CONTRATOS: &str = "contratos.last_updated";

/// The record store backed by SQLite
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create the store of a project
    pub fn open(project: &Project) -> Result<Self> {
        Self::open_path(&project.database_path())
    }

    /// Open or create a store at an explicit path
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).into_diagnostic()?;
        }

        let conn = Connection::open(path).into_diagnostic()?;

        // Enable WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .into_diagnostic()?;

        let store = Self { conn };
        if store.schema_version()? != SCHEMA_VERSION {
            store.init_schema()?;
        }
        Ok(store)
    }

    /// Open an empty store held in memory (tests and dry runs)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().into_diagnostic()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .into_diagnostic()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn schema_version(&self) -> Result<i32> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name = 'schema_version'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .into_diagnostic()?
            > 0;
        if !exists {
            return Ok(0);
        }

        let version: Option<i32> = self
            .conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .into_diagnostic()?;
        Ok(version.unwrap_or(0))
    }

    /// Run `f` inside a transaction, committing only when it succeeds
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction().into_diagnostic()?;
        let value = f(self)?;
        tx.commit().into_diagnostic()?;
        Ok(value)
    }

    // =====================================================================
    // Metadata
    // =====================================================================

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO store_meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .into_diagnostic()?;
        Ok(())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM store_meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .into_diagnostic()
    }

    /// Stamp a report family as updated now
    pub fn touch(&self, key: &str) -> Result<()> {
        self.set_meta(key, &Utc::now().to_rfc3339())
    }

    // =====================================================================
    // Import log
    // =====================================================================

    /// Whether a file with this content hash was already imported as `kind`
    pub fn import_seen(&self, kind: &str, file_hash: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM import_log WHERE kind = ?1 AND file_hash = ?2",
                params![kind, file_hash],
                |row| row.get(0),
            )
            .into_diagnostic()?;
        Ok(count > 0)
    }

    pub fn log_import(
        &self,
        kind: &str,
        file_name: &str,
        file_hash: &str,
        added: &[String],
        not_added: &[String],
    ) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO import_log (kind, file_name, file_hash, added, not_added, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    kind,
                    file_name,
                    file_hash,
                    serde_json::to_string(added).into_diagnostic()?,
                    serde_json::to_string(not_added).into_diagnostic()?,
                    Utc::now().to_rfc3339(),
                ],
            )
            .into_diagnostic()?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn import_log(&self) -> Result<Vec<ImportLogEntry>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, kind, file_name, file_hash, added, not_added, created_at
                 FROM import_log ORDER BY id",
            )
            .into_diagnostic()?;
        let rows = stmt
            .query_map([], |row| {
                let added: String = row.get(4)?;
                let not_added: String = row.get(5)?;
                Ok(ImportLogEntry {
                    id: row.get(0)?,
                    kind: row.get(1)?,
                    file_name: row.get(2)?,
                    file_hash: row.get(3)?,
                    added: serde_json::from_str(&added).unwrap_or_default(),
                    not_added: serde_json::from_str(&not_added).unwrap_or_default(),
                    created_at: row.get(6)?,
                })
            })
            .into_diagnostic()?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    // =====================================================================
    // Raw access
    // =====================================================================

    /// Row counts of the data tables
    pub fn stats(&self, db_path: Option<&Path>) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for table in schema::DATA_TABLES {
            let count: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })
                .into_diagnostic()?;
            stats.tables.insert((*table).to_string(), count as usize);
        }
        stats.db_size_bytes = db_path
            .and_then(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .unwrap_or(0);
        Ok(stats)
    }

    /// Execute a raw SQL query and return rows as strings
    pub fn query_raw(&self, sql: &str) -> Result<Vec<Vec<String>>> {
        let mut stmt = self.conn.prepare(sql).into_diagnostic()?;
        let column_count = stmt.column_count();

        let rows = stmt
            .query_map([], |row| {
                let mut values = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    let value: String = row
                        .get::<_, rusqlite::types::Value>(i)
                        .map(|v| match v {
                            rusqlite::types::Value::Null => "NULL".to_string(),
                            rusqlite::types::Value::Integer(i) => i.to_string(),
                            rusqlite::types::Value::Real(f) => f.to_string(),
                            rusqlite::types::Value::Text(s) => s,
                            rusqlite::types::Value::Blob(_) => "<blob>".to_string(),
                        })
                        .unwrap_or_default();
                    values.push(value);
                }
                Ok(values)
            })
            .into_diagnostic()?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .into_diagnostic()
    }

    /// Get column names for a query
    pub fn query_columns(&self, sql: &str) -> Result<Vec<String>> {
        let stmt = self.conn.prepare(sql).into_diagnostic()?;
        Ok(stmt.column_names().iter().map(|s| s.to_string()).collect())
    }
}

/// SHA-256 of file contents, hex encoded
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Push `clause` with a boxed parameter, numbering placeholders in order
pub(crate) fn push_filter(
    sql: &mut String,
    params: &mut Vec<Box<dyn rusqlite::ToSql>>,
    clause: &str,
    value: Box<dyn rusqlite::ToSql>,
) {
    params.push(value);
    sql.push_str(&clause.replace("?", &format!("?{}", params.len())));
}

#[cfg(test)]
mod tests;
