//! Document activity log for [`SqliteStore`].

use rusqlite::{Connection, Row, params};

use docflow_core::activity::ActivityEntry;

use crate::error::Result;
use crate::sqlite::documents::{format_datetime, parse_column, parse_datetime};
use crate::sqlite::store::SqliteStore;

fn scan_activity(row: &Row<'_>) -> rusqlite::Result<ActivityEntry> {
    let old_status: Option<String> = row.get("old_status")?;
    let new_status: Option<String> = row.get("new_status")?;
    let created_at: String = row.get("created_at")?;
    Ok(ActivityEntry {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        action: parse_column(row.get("action")?)?,
        actor: row.get("actor")?,
        old_status: old_status.map(parse_column).transpose()?,
        new_status: new_status.map(parse_column).transpose()?,
        step_order: row.get("step_order")?,
        comment: row.get("comment")?,
        created_at: parse_datetime(&created_at),
    })
}

pub(crate) fn insert_activity_on_conn(conn: &Connection, entry: &ActivityEntry) -> Result<i64> {
    conn.execute(
        "INSERT INTO activity (document_id, action, actor, old_status, new_status, step_order, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.document_id,
            entry.action.as_str(),
            entry.actor,
            entry.old_status.map(|s| s.as_str()),
            entry.new_status.map(|s| s.as_str()),
            entry.step_order,
            entry.comment,
            format_datetime(&entry.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn get_activity_on_conn(conn: &Connection, document_id: &str) -> Result<Vec<ActivityEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, document_id, action, actor, old_status, new_status, step_order, comment, created_at
         FROM activity WHERE document_id = ?1 ORDER BY created_at, id",
    )?;
    let rows = stmt.query_map(params![document_id], scan_activity)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

impl SqliteStore {
    pub fn get_activity_impl(&self, document_id: &str) -> Result<Vec<ActivityEntry>> {
        let conn = self.lock_conn()?;
        get_activity_on_conn(&conn, document_id)
    }
}
