//! Ledger schema definitions
//!
//! All SQL schema for the Trawl ledger database.

/// SQL schema for the ledger
pub const SCHEMA_SQL: &str = r#"
-- One row per job; a job survives restarts and is never deleted automatically
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    keywords_hash TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    status TEXT NOT NULL
);

-- One row per unit of work in any stage
CREATE TABLE IF NOT EXISTS work_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    stage TEXT NOT NULL,
    natural_key TEXT NOT NULL,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(job_id, stage, natural_key)
);

CREATE INDEX IF NOT EXISTS idx_work_items_status
    ON work_items(job_id, stage, status);

-- Domains already seen by discovery, with the sitemap lookup result.
-- Keyed per job so a rerun never probes the same domain twice.
CREATE TABLE IF NOT EXISTS discovered_domains (
    job_id INTEGER NOT NULL REFERENCES jobs(id),
    domain TEXT NOT NULL,
    sitemap_url TEXT,
    discovered_at TEXT NOT NULL,
    PRIMARY KEY (job_id, domain)
);
"#;

/// Initializes the ledger schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_initializes() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        assert!(initialize_schema(&conn).is_ok());
    }

    #[test]
    fn test_tables_exist_after_init() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        for table in ["jobs", "work_items", "discovered_domains"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "Table {} should exist", table);
        }
    }
}
