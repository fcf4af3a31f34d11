//! Document CRUD operations for [`SqliteStore`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use serde::de::DeserializeOwned;

use docflow_core::activity::ActivityEntry;
use docflow_core::document::Document;
use docflow_core::enums::ActivityAction;
use docflow_core::filter::DocumentFilter;

use crate::error::{Result, StorageError};
use crate::sqlite::activity::insert_activity_on_conn;
use crate::sqlite::store::SqliteStore;
use crate::traits::DocumentUpdates;

/// Document columns in SELECT order.
pub(crate) const DOCUMENT_COLUMNS: &str = r#"
    id, title, template_id, workflow_version_id, creator_id,
    status, current_step, round, assignments, form_data,
    submitted_at, approved_at, created_at, updated_at
"#;

// ---------------------------------------------------------------------------
// Row scanning
// ---------------------------------------------------------------------------

pub(crate) fn scan_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let submitted_at: Option<String> = row.get("submitted_at")?;
    let approved_at: Option<String> = row.get("approved_at")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Document {
        id: row.get("id")?,
        title: row.get("title")?,
        template_id: row.get("template_id")?,
        workflow_version_id: row.get("workflow_version_id")?,
        creator_id: row.get("creator_id")?,
        status: parse_column(row.get("status")?)?,
        current_step: row.get("current_step")?,
        round: row.get("round")?,
        assignments: json_column(row.get("assignments")?)?,
        form_data: json_column(row.get("form_data")?)?,
        submitted_at: submitted_at.as_deref().map(parse_datetime),
        approved_at: approved_at.as_deref().map(parse_datetime),
        created_at: parse_datetime(&created_at),
        updated_at: parse_datetime(&updated_at),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Formats a `DateTime<Utc>` as ISO 8601 TEXT for SQLite.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Parses an ISO 8601 TEXT string from SQLite into a `DateTime<Utc>`.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|_| {
        chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ"))
            .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
            .map(|ndt| ndt.and_utc())
            .unwrap_or_else(|_| Utc::now())
    })
}

/// Parses a TEXT column holding one of the core enums.
pub(crate) fn parse_column<T>(value: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Decodes a JSON TEXT column.
pub(crate) fn json_column<T: DeserializeOwned>(value: String) -> rusqlite::Result<T> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// True for a primary key or unique constraint violation.
pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}

// ---------------------------------------------------------------------------
// Connection-level helpers (used by both SqliteStore and Transaction)
// ---------------------------------------------------------------------------

/// Inserts a document and its `created` activity entry.
pub(crate) fn insert_document(conn: &Connection, doc: &Document, actor: &str) -> Result<()> {
    let assignments = serde_json::to_string(&doc.assignments)?;
    let form_data = serde_json::to_string(&doc.form_data)?;

    conn.execute(
        &format!(
            "INSERT INTO documents ({DOCUMENT_COLUMNS}) VALUES
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
        ),
        params![
            doc.id,
            doc.title,
            doc.template_id,
            doc.workflow_version_id,
            doc.creator_id,
            doc.status.as_str(),
            doc.current_step,
            doc.round,
            assignments,
            form_data,
            doc.submitted_at.as_ref().map(format_datetime),
            doc.approved_at.as_ref().map(format_datetime),
            format_datetime(&doc.created_at),
            format_datetime(&doc.updated_at),
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            StorageError::already_exists("document", &doc.id)
        } else {
            StorageError::Query(e)
        }
    })?;

    insert_activity_on_conn(
        conn,
        &ActivityEntry::new(&doc.id, ActivityAction::Created, actor, doc.created_at)
            .comment(Some(doc.title.clone())),
    )?;
    Ok(())
}

pub(crate) fn get_document_on_conn(conn: &Connection, id: &str) -> Result<Document> {
    let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1");
    conn.query_row(&sql, params![id], scan_document)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("document", id),
            other => StorageError::Query(other),
        })
}

pub(crate) fn update_document_on_conn(
    conn: &Connection,
    id: &str,
    updates: &DocumentUpdates,
) -> Result<()> {
    if updates.is_empty() {
        return Ok(());
    }

    let mut set_clauses: Vec<&str> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref title) = updates.title {
        set_clauses.push("title = ?");
        param_values.push(Box::new(title.clone()));
    }
    if let Some(status) = updates.status {
        set_clauses.push("status = ?");
        param_values.push(Box::new(status.as_str()));
    }
    if let Some(step) = updates.current_step {
        set_clauses.push("current_step = ?");
        param_values.push(Box::new(step));
    }
    if let Some(round) = updates.round {
        set_clauses.push("round = ?");
        param_values.push(Box::new(round));
    }
    if let Some(ref assignments) = updates.assignments {
        set_clauses.push("assignments = ?");
        param_values.push(Box::new(serde_json::to_string(assignments)?));
    }
    if let Some(ref form_data) = updates.form_data {
        set_clauses.push("form_data = ?");
        param_values.push(Box::new(serde_json::to_string(form_data)?));
    }
    if let Some(ref at) = updates.submitted_at {
        set_clauses.push("submitted_at = ?");
        param_values.push(Box::new(at.as_ref().map(format_datetime)));
    }
    if let Some(ref at) = updates.approved_at {
        set_clauses.push("approved_at = ?");
        param_values.push(Box::new(at.as_ref().map(format_datetime)));
    }

    let updated_at = updates.updated_at.unwrap_or_else(Utc::now);
    set_clauses.push("updated_at = ?");
    param_values.push(Box::new(format_datetime(&updated_at)));

    let sql = format!("UPDATE documents SET {} WHERE id = ?", set_clauses.join(", "));
    param_values.push(Box::new(id.to_string()));

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let affected = conn.execute(&sql, param_refs.as_slice())?;
    if affected == 0 {
        return Err(StorageError::not_found("document", id));
    }
    Ok(())
}

pub(crate) fn list_documents_on_conn(
    conn: &Connection,
    filter: &DocumentFilter,
) -> Result<Vec<Document>> {
    let mut where_clauses: Vec<&str> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(status) = filter.status {
        where_clauses.push("status = ?");
        param_values.push(Box::new(status.as_str()));
    }
    if let Some(ref creator) = filter.creator_id {
        where_clauses.push("creator_id = ?");
        param_values.push(Box::new(creator.clone()));
    }
    if let Some(template_id) = filter.template_id {
        where_clauses.push("template_id = ?");
        param_values.push(Box::new(template_id));
    }

    let mut sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents");
    if !where_clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&where_clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC, id");
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        param_values.push(Box::new(limit));
    }

    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(param_refs.as_slice(), scan_document)?;
    let mut docs = Vec::new();
    for row in rows {
        docs.push(row?);
    }
    Ok(docs)
}

// ---------------------------------------------------------------------------
// SqliteStore document methods
// ---------------------------------------------------------------------------

impl SqliteStore {
    pub fn create_document_impl(&self, doc: &Document, actor: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(StorageError::begin_failed)?;
        insert_document(&tx, doc, actor)?;
        tx.commit()
            .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))?;
        Ok(())
    }

    pub fn get_document_impl(&self, id: &str) -> Result<Document> {
        let conn = self.lock_conn()?;
        get_document_on_conn(&conn, id)
    }

    pub fn list_documents_impl(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        let conn = self.lock_conn()?;
        list_documents_on_conn(&conn, filter)
    }

    pub fn update_document_impl(&self, id: &str, updates: &DocumentUpdates) -> Result<()> {
        let conn = self.lock_conn()?;
        update_document_on_conn(&conn, id, updates)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use docflow_core::document::DocumentBuilder;
    use docflow_core::enums::{DocumentStatus, StepType};
    use docflow_core::form_data::CellRef;
    use docflow_core::template::{Sheet, Template};
    use docflow_core::workflow::WorkflowStep;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Store with one template and one published single-step workflow.
    pub(crate) fn seeded_store() -> (SqliteStore, i64, i64) {
        let store = SqliteStore::open_in_memory().unwrap();
        let template = Template::new(
            "Purchase",
            vec![Sheet::new("Main", r#"[number qty cell="A1"]"#)],
            Utc::now(),
        );
        let template_id = store.create_template_impl(&template).unwrap();
        let version = store
            .create_workflow_version_impl(
                "standard",
                template_id,
                &[WorkflowStep::new(1, StepType::Approve).with_approvers(["carol"])],
                Utc::now(),
            )
            .unwrap();
        (store, template_id, version.id)
    }

    pub(crate) fn draft(id: &str, template_id: i64, version_id: i64) -> Document {
        DocumentBuilder::new("Laptop order")
            .id(id)
            .template(template_id)
            .workflow_version(version_id)
            .creator("alice")
            .build()
    }

    #[test]
    fn create_and_get_document() {
        let (store, t, v) = seeded_store();
        let mut doc = draft("doc-abc123", t, v);
        doc.form_data.set(&CellRef::new("Main", "A1"), json!(3));
        doc.assignments.insert(1, vec!["carol".into()]);
        store.create_document_impl(&doc, "alice").unwrap();

        let loaded = store.get_document_impl("doc-abc123").unwrap();
        assert_eq!(loaded.title, "Laptop order");
        assert_eq!(loaded.status, DocumentStatus::Draft);
        assert_eq!(loaded.form_data, doc.form_data);
        assert_eq!(loaded.assignments, doc.assignments);

        let log = store.get_activity_impl("doc-abc123").unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, ActivityAction::Created);
    }

    #[test]
    fn duplicate_id_is_reported() {
        let (store, t, v) = seeded_store();
        store.create_document_impl(&draft("doc-dup", t, v), "alice").unwrap();
        let err = store
            .create_document_impl(&draft("doc-dup", t, v), "alice")
            .unwrap_err();
        assert!(err.is_already_exists(), "{err}");
    }

    #[test]
    fn missing_document_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_document_impl("doc-none").unwrap_err().is_not_found());
        let err = store
            .update_document_impl(
                "doc-none",
                &DocumentUpdates {
                    round: Some(1),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn partial_update_and_clear() {
        let (store, t, v) = seeded_store();
        store.create_document_impl(&draft("doc-upd", t, v), "alice").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        store
            .update_document_impl(
                "doc-upd",
                &DocumentUpdates {
                    status: Some(DocumentStatus::Pending),
                    current_step: Some(1),
                    round: Some(1),
                    submitted_at: Some(Some(at)),
                    ..Default::default()
                },
            )
            .unwrap();
        let doc = store.get_document_impl("doc-upd").unwrap();
        assert_eq!(doc.status, DocumentStatus::Pending);
        assert_eq!(doc.current_step, 1);
        assert_eq!(doc.submitted_at, Some(at));
        assert_eq!(doc.title, "Laptop order");

        store
            .update_document_impl(
                "doc-upd",
                &DocumentUpdates {
                    submitted_at: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.get_document_impl("doc-upd").unwrap().submitted_at, None);
    }

    #[test]
    fn list_filters_by_status() {
        let (store, t, v) = seeded_store();
        store.create_document_impl(&draft("doc-a", t, v), "alice").unwrap();
        store.create_document_impl(&draft("doc-b", t, v), "alice").unwrap();
        store
            .update_document_impl(
                "doc-b",
                &DocumentUpdates {
                    status: Some(DocumentStatus::Rejected),
                    ..Default::default()
                },
            )
            .unwrap();

        let all = store.list_documents_impl(&DocumentFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        let rejected = store
            .list_documents_impl(&DocumentFilter {
                status: Some(DocumentStatus::Rejected),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].id, "doc-b");
        let limited = store
            .list_documents_impl(&DocumentFilter {
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn datetime_round_trip_keeps_millis() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
            + chrono::Duration::milliseconds(678);
        assert_eq!(parse_datetime(&format_datetime(&at)), at);
        assert_eq!(
            parse_datetime("2026-01-02 03:04:05"),
            Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
        );
    }
}
