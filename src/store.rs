//! Persistent vendor → codes memory.
//!
//! A run opens the store once, takes a [`HistorySnapshot`] for annotation and
//! writes back only after review. Only one process may write at a time; this
//! is an operating constraint, nothing here arbitrates between processes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::db::{get_connection, init_db, quick_check, schema_version, SCHEMA_VERSION};
use crate::error::{LedgerError, Result};
use crate::models::{CodeChoices, CodingHistoryRecord, MatchKind};

/// Deterministic lookup key: case-folded, punctuation and whitespace runs
/// collapsed to single spaces.
pub fn vendor_key(vendor: &str) -> String {
    let folded: String = vendor
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub struct CodingStore {
    conn: Connection,
    path: PathBuf,
}

impl CodingStore {
    /// Open (creating if needed) the store at `path`. Any failure to read or
    /// verify an existing file is reported as `StoreUnavailable`.
    pub fn open(path: &Path) -> Result<Self> {
        let unavailable = |reason: String| LedgerError::StoreUnavailable {
            path: path.to_path_buf(),
            reason,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;
        }
        let conn = get_connection(path).map_err(|e| unavailable(e.to_string()))?;
        if let Some(problem) = quick_check(&conn).map_err(|e| unavailable(e.to_string()))? {
            return Err(unavailable(format!("integrity check failed: {problem}")));
        }
        let version = schema_version(&conn).map_err(|e| unavailable(e.to_string()))?;
        if version > SCHEMA_VERSION {
            return Err(unavailable(format!(
                "schema version {version} is newer than supported version {SCHEMA_VERSION}"
            )));
        }
        init_db(&conn).map_err(|e| unavailable(e.to_string()))?;
        tracing::debug!(path = %path.display(), "coding store opened");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Move an unreadable store aside and start an empty one. Callers must
    /// have the user's consent; the old file is kept next to the new one.
    pub fn reinitialize(path: &Path) -> Result<Self> {
        if path.exists() {
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("coding_history.db");
            let aside = path.with_file_name(format!("{file_name}.corrupt-{stamp}"));
            std::fs::rename(path, &aside)?;
            for suffix in ["-wal", "-shm"] {
                let sidecar = path.with_file_name(format!("{file_name}{suffix}"));
                if sidecar.exists() {
                    std::fs::remove_file(&sidecar)?;
                }
            }
            tracing::warn!(moved_to = %aside.display(), "coding store reinitialized");
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn lookup(&self, vendor_key: &str) -> Result<Option<CodingHistoryRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT vendor_key, gl_code, location_code, program_code, funder_code, dept_code, last_used \
                 FROM vendor_codes WHERE vendor_key = ?1",
                [vendor_key],
                row_to_parts,
            )
            .optional()?;
        row.map(parts_to_record).transpose()
    }

    /// Insert or overwrite the record for `vendor_key`. Last write wins.
    pub fn upsert(&self, vendor_key: &str, codes: &CodeChoices, timestamp: DateTime<Utc>) -> Result<()> {
        if vendor_key.is_empty() {
            return Err(LedgerError::Other("vendor key must not be empty".to_string()));
        }
        self.conn.execute(
            "INSERT INTO vendor_codes (vendor_key, gl_code, location_code, program_code, funder_code, dept_code, last_used) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(vendor_key) DO UPDATE SET \
                gl_code = excluded.gl_code, \
                location_code = excluded.location_code, \
                program_code = excluded.program_code, \
                funder_code = excluded.funder_code, \
                dept_code = excluded.dept_code, \
                last_used = excluded.last_used",
            rusqlite::params![
                vendor_key,
                codes.gl,
                codes.location,
                codes.program,
                codes.funder,
                codes.dept,
                timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn forget(&self, vendor_key: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM vendor_codes WHERE vendor_key = ?1", [vendor_key])?;
        Ok(n > 0)
    }

    pub fn records(&self) -> Result<Vec<CodingHistoryRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT vendor_key, gl_code, location_code, program_code, funder_code, dept_code, last_used \
             FROM vendor_codes ORDER BY vendor_key",
        )?;
        let parts = stmt
            .query_map([], row_to_parts)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        parts.into_iter().map(parts_to_record).collect()
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT count(*) FROM vendor_codes", [], |r| r.get(0))?)
    }

    /// Read every record in one statement so annotation sees a single,
    /// consistent view of history.
    pub fn snapshot(&self) -> Result<HistorySnapshot> {
        let records = self
            .records()?
            .into_iter()
            .map(|r| (r.vendor_key.clone(), r))
            .collect();
        Ok(HistorySnapshot { records })
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| LedgerError::Db(e))?;
        tracing::debug!(path = %self.path.display(), "coding store closed");
        Ok(())
    }
}

type RowParts = (
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<RowParts> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn parts_to_record(parts: RowParts) -> Result<CodingHistoryRecord> {
    let (vendor_key, gl, location, program, funder, dept, last_used) = parts;
    let last_used = DateTime::parse_from_rfc3339(&last_used)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Other(format!("bad timestamp for '{vendor_key}': {e}")))?;
    Ok(CodingHistoryRecord {
        vendor_key,
        codes: CodeChoices {
            gl,
            location,
            program,
            funder,
            dept,
        },
        last_used,
    })
}

/// In-memory copy of the history table taken at one point in time.
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    records: BTreeMap<String, CodingHistoryRecord>,
}

impl HistorySnapshot {
    pub fn from_records(records: impl IntoIterator<Item = CodingHistoryRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.vendor_key.clone(), r))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn lookup(&self, vendor_key: &str) -> Option<&CodingHistoryRecord> {
        self.records.get(vendor_key)
    }

    /// Exact key first, then the longest stored key that is a whole-word
    /// prefix of `vendor_key`.
    pub fn find(&self, vendor_key: &str) -> Option<(&CodingHistoryRecord, MatchKind)> {
        if let Some(record) = self.lookup(vendor_key) {
            return Some((record, MatchKind::Exact));
        }
        let boundaries: Vec<usize> = vendor_key.match_indices(' ').map(|(i, _)| i).collect();
        boundaries
            .iter()
            .rev()
            .find_map(|&end| self.lookup(&vendor_key[..end]))
            .map(|record| (record, MatchKind::Prefix))
    }
}
