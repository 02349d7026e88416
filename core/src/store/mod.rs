//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Generators and the runner call store methods; they never execute SQL
//! directly. Transformation units are the one exception: their SQL is
//! opaque text that the store runs on their behalf.

use crate::error::{SimError, SimResult};
use rusqlite::{params, types::ValueRef, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

mod derived;
mod raw;

/// Raw tables, parents before children.
pub const RAW_TABLES: &[&str] = &[
    "raw_products",
    "raw_customers",
    "raw_events",
    "raw_orders",
    "raw_order_items",
    "raw_ab_tests",
    "raw_ab_assignments",
];

pub struct SimStore {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRow {
    pub run_id: String,
    pub seed: u64,
    pub customer_count: u64,
    pub as_of: String,
    pub version: String,
    pub status: String,
    pub report_json: Option<String>,
}

impl SimStore {
    /// Open (or create) the warehouse database at `path`.
    pub fn open(path: &str) -> SimResult<Self> {
        let unavailable = |source| SimError::StoreUnavailable { path: path.to_string(), source };
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(unavailable)?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;").map_err(unavailable)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory().map_err(|source| SimError::StoreUnavailable {
            path: ":memory:".into(),
            source,
        })?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_raw_tables.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_pipeline_runs.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id: &str,
        seed: u64,
        customer_count: usize,
        as_of: &str,
        version: &str,
    ) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO pipeline_run (run_id, seed, customer_count, as_of, version, status, started_seq)
             VALUES (?1, ?2, ?3, ?4, ?5, 'generating',
                     (SELECT COALESCE(MAX(started_seq), 0) + 1 FROM pipeline_run))",
            params![run_id, seed as i64, customer_count as i64, as_of, version],
        )?;
        Ok(())
    }

    pub fn set_run_status(&self, run_id: &str, status: &str) -> SimResult<()> {
        self.conn.execute(
            "UPDATE pipeline_run SET status = ?1 WHERE run_id = ?2",
            params![status, run_id],
        )?;
        Ok(())
    }

    pub fn finish_run(&self, run_id: &str, status: &str, report_json: &str) -> SimResult<()> {
        self.conn.execute(
            "UPDATE pipeline_run SET status = ?1, report_json = ?2 WHERE run_id = ?3",
            params![status, report_json, run_id],
        )?;
        Ok(())
    }

    pub fn latest_run(&self) -> SimResult<Option<RunRow>> {
        self.conn
            .query_row(
                "SELECT run_id, seed, customer_count, as_of, version, status, report_json
                 FROM pipeline_run ORDER BY started_seq DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRow {
                        run_id: row.get(0)?,
                        seed: row.get::<_, i64>(1)? as u64,
                        customer_count: row.get::<_, i64>(2)? as u64,
                        as_of: row.get(3)?,
                        version: row.get(4)?,
                        status: row.get(5)?,
                        report_json: row.get(6)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    // ── Inspection ─────────────────────────────────────────────

    pub fn table_exists(&self, table: &str) -> SimResult<bool> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn row_count(&self, table: &str) -> SimResult<i64> {
        let table = checked_identifier(table)?;
        let n = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{table}\""), [], |row| row.get(0))?;
        Ok(n)
    }

    /// Every row of `table` in rowid order, one line per row with
    /// values rendered losslessly. Used to compare tables across runs.
    pub fn dump_table(&self, table: &str) -> SimResult<Vec<String>> {
        let table = checked_identifier(table)?;
        let mut stmt = self.conn.prepare(&format!("SELECT * FROM \"{table}\" ORDER BY rowid"))?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                let mut cells = Vec::with_capacity(width);
                for i in 0..width {
                    cells.push(match row.get_ref(i)? {
                        ValueRef::Null => "NULL".to_string(),
                        ValueRef::Integer(v) => v.to_string(),
                        // Bit pattern, so two floats only match if identical.
                        ValueRef::Real(v) => format!("{v}#{:016x}", v.to_bits()),
                        ValueRef::Text(t) => format!("'{}'", String::from_utf8_lossy(t)),
                        ValueRef::Blob(b) => format!("x{}", b.len()),
                    });
                }
                Ok(cells.join("|"))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Table names come from manifests and tests; keep them to plain identifiers.
fn checked_identifier(name: &str) -> SimResult<&str> {
    let ok = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if ok {
        Ok(name)
    } else {
        Err(SimError::InvalidArgument(format!("'{name}' is not a plain table name")))
    }
}
