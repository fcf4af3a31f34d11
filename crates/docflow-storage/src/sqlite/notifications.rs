//! Notification outbox for [`SqliteStore`].

use rusqlite::{Row, params};

use crate::error::Result;
use crate::sqlite::documents::{format_datetime, json_column, parse_column, parse_datetime};
use crate::sqlite::store::SqliteStore;
use crate::traits::OutboxEntry;

fn scan_entry(row: &Row<'_>) -> rusqlite::Result<OutboxEntry> {
    let created_at: String = row.get("created_at")?;
    Ok(OutboxEntry {
        id: row.get("id")?,
        kind: parse_column(row.get("kind")?)?,
        recipient: row.get("recipient")?,
        payload: json_column(row.get("payload")?)?,
        created_at: parse_datetime(&created_at),
    })
}

impl SqliteStore {
    pub fn record_notification_impl(&self, entry: &OutboxEntry) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO notifications (kind, recipient, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.kind.as_str(),
                entry.recipient,
                serde_json::to_string(&entry.payload)?,
                format_datetime(&entry.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest first.
    pub fn list_notifications_impl(&self, limit: Option<i64>) -> Result<Vec<OutboxEntry>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, recipient, payload, created_at
             FROM notifications ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit.unwrap_or(-1)], scan_entry)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
