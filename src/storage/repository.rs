//! Record store abstraction
//!
//! The upload pipeline only talks to storage through the [`RecordStore`]
//! trait, which keeps the coordinator testable against instrumented stores
//! and leaves room for other backends.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Upload Coordinator                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RecordStore trait                       │
//! │  count_pending, fetch_pending, mark_delivered, insert, ...  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SqliteRecordStore                        │
//! │  one table per record kind, one flag column per target      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use towersync::storage::{RecordStore, SqliteRecordStore, TargetSelector};
//!
//! let store = SqliteRecordStore::new("survey.db")?;
//! let pending = store.count_pending(TargetSelector::Any)?;
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

use super::schema;
use crate::error::{Error, Result};
use crate::models::{RecordId, RecordKind, StoredRecord, SurveyRecord, UploadTarget};

// ============================================================================
// Core Types
// ============================================================================

/// Which delivery flag a pending query looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSelector {
    /// Rows not yet accepted by this target
    Target(UploadTarget),
    /// Rows not yet accepted by at least one target
    Any,
}

impl TargetSelector {
    /// SQL predicate selecting pending rows
    fn predicate(&self) -> String {
        match self {
            Self::Target(target) => format!("{} = 0", target.flag_column()),
            Self::Any => {
                let clauses: Vec<String> = UploadTarget::ALL
                    .iter()
                    .map(|t| format!("{} = 0", t.flag_column()))
                    .collect();
                format!("({})", clauses.join(" OR "))
            }
        }
    }
}

impl From<UploadTarget> for TargetSelector {
    fn from(target: UploadTarget) -> Self {
        Self::Target(target)
    }
}

/// Pending counts per kind and target
#[derive(Debug, Clone, Default, Serialize)]
pub struct PendingSummary {
    pub kinds: BTreeMap<RecordKind, KindSummary>,
}

/// Row counts of one kind table
#[derive(Debug, Clone, Default, Serialize)]
pub struct KindSummary {
    pub total: usize,
    pub pending: BTreeMap<UploadTarget, usize>,
    /// Rows accepted by every target and safe to delete
    pub fully_delivered: usize,
}

impl PendingSummary {
    /// Total rows across all kinds
    pub fn total(&self) -> usize {
        self.kinds.values().map(|k| k.total).sum()
    }

    /// Pending rows for one target across all kinds
    pub fn pending_for(&self, target: UploadTarget) -> usize {
        self.kinds
            .values()
            .map(|k| k.pending.get(&target).copied().unwrap_or(0))
            .sum()
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Durable storage of survey records with per-target delivery state
///
/// Any error returned from these methods is a storage failure and is fatal
/// to the upload run in progress.
pub trait RecordStore: Send + Sync {
    /// Count records across all kinds pending for the selector
    fn count_pending(&self, selector: TargetSelector) -> Result<usize>;

    /// Fetch up to `limit` pending records of `kind`, oldest first
    fn fetch_pending(
        &self,
        kind: RecordKind,
        selector: TargetSelector,
        limit: usize,
    ) -> Result<Vec<StoredRecord>>;

    /// Set the target's delivery flag for the given ids, all or none
    fn mark_delivered(&self, target: UploadTarget, kind: RecordKind, ids: &[RecordId])
        -> Result<()>;

    /// Append newly captured records, returning their row ids in input order
    fn insert(&self, records: &[SurveyRecord]) -> Result<Vec<RecordId>>;

    /// Per-kind, per-target row counts
    fn pending_summary(&self) -> Result<PendingSummary>;

    /// Delete records every target has accepted, returning the number removed
    fn purge_delivered(&self) -> Result<usize>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of [`RecordStore`]
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open (or create) the record database at `path`
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL lets the capture side keep appending while an upload runs
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "Record store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::other("Record store connection mutex poisoned"))
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        for kind in RecordKind::ALL {
            conn.execute_batch(&schema::create_table_sql(kind))?;
        }
        Ok(())
    }

    fn count_where(conn: &Connection, kind: RecordKind, predicate: &str) -> Result<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {predicate}",
            kind.table_name()
        );
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl RecordStore for SqliteRecordStore {
    fn count_pending(&self, selector: TargetSelector) -> Result<usize> {
        let conn = self.lock()?;
        let predicate = selector.predicate();

        let mut total = 0;
        for kind in RecordKind::ALL {
            total += Self::count_where(&conn, kind, &predicate)?;
        }
        Ok(total)
    }

    fn fetch_pending(
        &self,
        kind: RecordKind,
        selector: TargetSelector,
        limit: usize,
    ) -> Result<Vec<StoredRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // SQLite reads a negative LIMIT as unbounded
        let limit = i64::try_from(limit)
            .map_err(|_| Error::config(format!("Fetch limit {limit} is out of range")))?;

        let conn = self.lock()?;
        let sql = format!(
            "SELECT * FROM {} WHERE {} ORDER BY id ASC LIMIT ?1",
            kind.table_name(),
            selector.predicate()
        );

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([limit], |row| schema::read_stored(kind, row))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn mark_delivered(
        &self,
        target: UploadTarget,
        kind: RecordKind,
        ids: &[RecordId],
    ) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let sql = format!(
            "UPDATE {} SET {} = 1 WHERE id = ?1",
            kind.table_name(),
            target.flag_column()
        );
        {
            let mut stmt = tx.prepare(&sql)?;
            for id in ids {
                stmt.execute([id])?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            registry = target.as_str(),
            kind = kind.as_str(),
            records = ids.len(),
            "Records marked as delivered"
        );
        Ok(())
    }

    fn insert(&self, records: &[SurveyRecord]) -> Result<Vec<RecordId>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let sql = schema::insert_sql(record.kind());
            let mut stmt = tx.prepare_cached(&sql)?;
            stmt.execute(params_from_iter(schema::insert_values(record)))?;
            ids.push(tx.last_insert_rowid());
        }
        tx.commit()?;

        tracing::debug!(records = ids.len(), "Survey records stored");
        Ok(ids)
    }

    fn pending_summary(&self) -> Result<PendingSummary> {
        let conn = self.lock()?;
        let all_delivered: Vec<String> = UploadTarget::ALL
            .iter()
            .map(|t| format!("{} = 1", t.flag_column()))
            .collect();
        let all_delivered = all_delivered.join(" AND ");

        let mut summary = PendingSummary::default();
        for kind in RecordKind::ALL {
            let mut kind_summary = KindSummary {
                total: Self::count_where(&conn, kind, "1 = 1")?,
                fully_delivered: Self::count_where(&conn, kind, &all_delivered)?,
                ..Default::default()
            };
            for target in UploadTarget::ALL {
                let pending =
                    Self::count_where(&conn, kind, &TargetSelector::Target(target).predicate())?;
                kind_summary.pending.insert(target, pending);
            }
            summary.kinds.insert(kind, kind_summary);
        }

        Ok(summary)
    }

    fn purge_delivered(&self) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let all_delivered: Vec<String> = UploadTarget::ALL
            .iter()
            .map(|t| format!("{} = 1", t.flag_column()))
            .collect();
        let all_delivered = all_delivered.join(" AND ");

        let mut removed = 0;
        for kind in RecordKind::ALL {
            removed += tx.execute(
                &format!("DELETE FROM {} WHERE {all_delivered}", kind.table_name()),
                [],
            )?;
        }
        tx.commit()?;

        tracing::info!(records = removed, "Purged fully delivered records");
        Ok(removed)
    }
}
