use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS vendor_codes (
    vendor_key TEXT PRIMARY KEY,
    gl_code TEXT,
    location_code TEXT,
    program_code TEXT,
    funder_code TEXT,
    dept_code TEXT,
    last_used TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now'))
);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
    Ok(conn)
}

/// Returns `Some(problem)` when SQLite's own consistency check fails.
pub fn quick_check(conn: &Connection) -> Result<Option<String>> {
    let result: String = conn.query_row("PRAGMA quick_check", [], |row| row.get(0))?;
    if result == "ok" {
        Ok(None)
    } else {
        Ok(Some(result))
    }
}

pub fn schema_version(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    if schema_version(conn)? == 0 {
        conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    }
    Ok(())
}
