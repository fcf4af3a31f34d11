//! Approver row queries for [`SqliteStore`].
//!
//! Rows are append-only. The only mutations are an approver's own decision
//! and the overdue reminder stamp.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use docflow_core::approver::{ApproverUpdates, DocumentApprover};
use docflow_core::filter::ApproverFilter;

use crate::error::{Result, StorageError};
use crate::sqlite::documents::{format_datetime, parse_column, parse_datetime};
use crate::sqlite::store::SqliteStore;

pub(crate) const APPROVER_COLUMNS: &str = r#"
    a.id, a.document_id, a.round, a.step_order, a.step_type, a.approver_id, a.status,
    a.approved_at, a.rejected_at, a.comment, a.overdue_notified_at, a.created_at
"#;

/// Join condition selecting the rows of each document's active step.
const ACTIVE_STEP: &str = "a.step_order = d.current_step AND a.round = d.round";

pub(crate) fn scan_approver(row: &Row<'_>) -> rusqlite::Result<DocumentApprover> {
    let approved_at: Option<String> = row.get("approved_at")?;
    let rejected_at: Option<String> = row.get("rejected_at")?;
    let notified_at: Option<String> = row.get("overdue_notified_at")?;
    let created_at: String = row.get("created_at")?;
    Ok(DocumentApprover {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        round: row.get("round")?,
        step_order: row.get("step_order")?,
        step_type: parse_column(row.get("step_type")?)?,
        approver_id: row.get("approver_id")?,
        status: parse_column(row.get("status")?)?,
        approved_at: approved_at.as_deref().map(parse_datetime),
        rejected_at: rejected_at.as_deref().map(parse_datetime),
        comment: row.get("comment")?,
        overdue_notified_at: notified_at.as_deref().map(parse_datetime),
        created_at: parse_datetime(&created_at),
    })
}

fn collect(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Vec<DocumentApprover>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, scan_approver)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Connection-level helpers (used by both SqliteStore and Transaction)
// ---------------------------------------------------------------------------

pub(crate) fn insert_approvers_on_conn(
    conn: &Connection,
    rows: &[DocumentApprover],
) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "INSERT INTO document_approvers
            (document_id, round, step_order, step_type, approver_id, status,
             approved_at, rejected_at, comment, overdue_notified_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    let mut ids = Vec::with_capacity(rows.len());
    for row in rows {
        stmt.execute(params![
            row.document_id,
            row.round,
            row.step_order,
            row.step_type.as_str(),
            row.approver_id,
            row.status.as_str(),
            row.approved_at.as_ref().map(format_datetime),
            row.rejected_at.as_ref().map(format_datetime),
            row.comment,
            row.overdue_notified_at.as_ref().map(format_datetime),
            format_datetime(&row.created_at),
        ])?;
        ids.push(conn.last_insert_rowid());
    }
    Ok(ids)
}

pub(crate) fn update_approver_on_conn(
    conn: &Connection,
    id: i64,
    updates: &ApproverUpdates,
) -> Result<()> {
    let mut set_clauses: Vec<&str> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(status) = updates.status {
        set_clauses.push("status = ?");
        param_values.push(Box::new(status.as_str()));
    }
    if let Some(ref at) = updates.approved_at {
        set_clauses.push("approved_at = ?");
        param_values.push(Box::new(format_datetime(at)));
    }
    if let Some(ref at) = updates.rejected_at {
        set_clauses.push("rejected_at = ?");
        param_values.push(Box::new(format_datetime(at)));
    }
    if let Some(ref comment) = updates.comment {
        set_clauses.push("comment = ?");
        param_values.push(Box::new(comment.clone()));
    }
    if set_clauses.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "UPDATE document_approvers SET {} WHERE id = ?",
        set_clauses.join(", ")
    );
    param_values.push(Box::new(id));
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let affected = conn.execute(&sql, param_refs.as_slice())?;
    if affected == 0 {
        return Err(StorageError::not_found("approver", id.to_string()));
    }
    Ok(())
}

pub(crate) fn find_approvers_on_conn(
    conn: &Connection,
    filter: &ApproverFilter,
) -> Result<Vec<DocumentApprover>> {
    let mut where_clauses: Vec<&str> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref document_id) = filter.document_id {
        where_clauses.push("a.document_id = ?");
        param_values.push(Box::new(document_id.clone()));
    }
    if let Some(round) = filter.round {
        where_clauses.push("a.round = ?");
        param_values.push(Box::new(round));
    }
    if let Some(step) = filter.step_order {
        where_clauses.push("a.step_order = ?");
        param_values.push(Box::new(step));
    }
    if let Some(ref approver_id) = filter.approver_id {
        where_clauses.push("a.approver_id = ?");
        param_values.push(Box::new(approver_id.clone()));
    }
    if let Some(status) = filter.status {
        where_clauses.push("a.status = ?");
        param_values.push(Box::new(status.as_str()));
    }

    let mut sql = format!("SELECT {APPROVER_COLUMNS} FROM document_approvers a");
    if !where_clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY a.document_id, a.round, a.step_order, a.id");

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    collect(conn, &sql, &param_refs)
}

pub(crate) fn mark_overdue_notified_on_conn(
    conn: &Connection,
    ids: &[i64],
    at: DateTime<Utc>,
) -> Result<usize> {
    let at = format_datetime(&at);
    let mut stmt = conn.prepare(
        "UPDATE document_approvers SET overdue_notified_at = ?1
         WHERE id = ?2 AND overdue_notified_at IS NULL",
    )?;
    let mut stamped = 0;
    for id in ids {
        stamped += stmt.execute(params![at, id])?;
    }
    Ok(stamped)
}

// ---------------------------------------------------------------------------
// SqliteStore approver methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    pub fn find_approvers_impl(&self, filter: &ApproverFilter) -> Result<Vec<DocumentApprover>> {
        let conn = self.lock_conn()?;
        find_approvers_on_conn(&conn, filter)
    }

    pub fn get_overdue_candidates_impl(&self) -> Result<Vec<DocumentApprover>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {APPROVER_COLUMNS}
             FROM document_approvers a
             JOIN documents d ON d.id = a.document_id
             WHERE a.status = 'pending'
               AND d.status = 'pending'
               AND {ACTIVE_STEP}
               AND a.overdue_notified_at IS NULL
             ORDER BY a.approver_id, a.document_id, a.id"
        );
        collect(&conn, &sql, &[])
    }

    pub fn count_active_pending_impl(&self, approver_id: &str) -> Result<i64> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT COUNT(*)
             FROM document_approvers a
             JOIN documents d ON d.id = a.document_id
             WHERE a.approver_id = ?1
               AND a.status = 'pending'
               AND d.status = 'pending'
               AND {ACTIVE_STEP}"
        );
        Ok(conn.query_row(&sql, params![approver_id], |row| row.get(0))?)
    }

    pub fn get_previous_step_approval_impl(
        &self,
        document_id: &str,
        step_order: u32,
    ) -> Result<Option<DocumentApprover>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {APPROVER_COLUMNS}
             FROM document_approvers a
             WHERE a.document_id = ?1 AND a.step_order = ?2
               AND a.status = 'approved' AND a.approved_at IS NOT NULL
             ORDER BY a.approved_at DESC, a.id DESC
             LIMIT 1"
        );
        Ok(conn
            .query_row(&sql, params![document_id, step_order], scan_approver)
            .optional()?)
    }
}
