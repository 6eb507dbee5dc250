//! Saved invoice repository
//!
//! Provides save, list, load and mark-sent operations on generated invoices.

use crate::error::{Error, Result};
use crate::types::{InvoiceData, SavedInvoice};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;

/// Invoice store with a single connection
pub struct InvoiceStore {
    conn: Mutex<Connection>,
}

/// Timestamps are stored with fixed precision so text order is time order.
fn to_db_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_db_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl InvoiceStore {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this store
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    /// Persist a freshly generated invoice
    pub fn save(&self, config_id: &str, invoice: &InvoiceData) -> Result<SavedInvoice> {
        self.save_at(config_id, invoice, Utc::now())
    }

    /// Persist an invoice with an explicit generation time
    pub fn save_at(
        &self,
        config_id: &str,
        invoice: &InvoiceData,
        generated_at: DateTime<Utc>,
    ) -> Result<SavedInvoice> {
        let saved = SavedInvoice {
            id: uuid::Uuid::new_v4().to_string(),
            config_id: config_id.to_string(),
            invoice: invoice.clone(),
            generated_at,
            sent_at: None,
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO invoices (id, config_id, customer, generated_at, sent_at, data)
            VALUES (?1, ?2, ?3, ?4, NULL, ?5)
            "#,
            params![
                saved.id,
                saved.config_id,
                saved.invoice.customer,
                to_db_time(&saved.generated_at),
                serde_json::to_string(&saved.invoice)?,
            ],
        )?;

        tracing::info!(id = %saved.id, config_id, "Saved invoice");
        Ok(saved)
    }

    /// List saved invoices, newest first, optionally for one configuration
    pub fn list(&self, config_id: Option<&str>) -> Result<Vec<SavedInvoice>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM invoices
            WHERE (?1 IS NULL OR config_id = ?1)
            ORDER BY generated_at DESC, rowid DESC
            "#,
        )?;

        let rows = stmt.query_map(params![config_id], Self::row_to_saved)?;
        let mut invoices = Vec::new();
        for row in rows {
            invoices.push(row??);
        }
        Ok(invoices)
    }

    /// Load one saved invoice
    pub fn load(&self, id: &str) -> Result<SavedInvoice> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM invoices WHERE id = ?", [id], Self::row_to_saved)
            .optional()?
            .ok_or_else(|| Error::InvoiceNotFound(id.to_string()))?
    }

    /// Record that an invoice was delivered
    pub fn mark_sent(&self, id: &str) -> Result<DateTime<Utc>> {
        let sent_at = Utc::now();
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE invoices SET sent_at = ?1 WHERE id = ?2",
            params![to_db_time(&sent_at), id],
        )?;
        if updated == 0 {
            return Err(Error::InvoiceNotFound(id.to_string()));
        }
        tracing::info!(id, "Marked invoice as sent");
        Ok(sent_at)
    }

    /// Outer result is the row read, inner result the JSON payload decode
    fn row_to_saved(row: &Row) -> rusqlite::Result<Result<SavedInvoice>> {
        let generated_at: String = row.get("generated_at")?;
        let sent_at: Option<String> = row.get("sent_at")?;
        let data: String = row.get("data")?;
        let id: String = row.get("id")?;
        let config_id: String = row.get("config_id")?;

        Ok(serde_json::from_str::<InvoiceData>(&data)
            .map_err(Error::from)
            .map(|invoice| SavedInvoice {
                id,
                config_id,
                invoice,
                generated_at: from_db_time(&generated_at).unwrap_or_else(Utc::now),
                sent_at: sent_at.as_deref().and_then(from_db_time),
            }))
    }
}
