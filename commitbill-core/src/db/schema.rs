//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: saved invoices
    r#"
    CREATE TABLE IF NOT EXISTS invoices (
        id               TEXT PRIMARY KEY,
        config_id        TEXT NOT NULL,
        customer         TEXT NOT NULL,
        generated_at     DATETIME NOT NULL,
        sent_at          DATETIME,

        -- Full InvoiceData as JSON
        data             JSON NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_invoices_config ON invoices(config_id);
    CREATE INDEX IF NOT EXISTS idx_invoices_generated ON invoices(generated_at);
    "#,
];

/// Apply every migration newer than the store's `user_version`.
///
/// Each step runs in its own transaction together with the version bump. A
/// store written by a newer build is refused rather than guessed at.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current = get_schema_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(Error::Config(format!(
            "invoice store has schema version {current}, this build supports up to {SCHEMA_VERSION}"
        )));
    }

    for (version, sql) in (1..).zip(MIGRATIONS.iter()).skip(current as usize) {
        tracing::info!(version, "Migrating invoice store");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_schema_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_newer_store_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        assert!(matches!(run_migrations(&conn), Err(Error::Config(_))));
    }

    #[test]
    fn test_invoices_table_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let exists: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='invoices'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(exists, 1);
    }
}
