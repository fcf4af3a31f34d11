//! Workflow versions and their step definitions for [`SqliteStore`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use docflow_core::enums::VersionStatus;
use docflow_core::form_data::CellRef;
use docflow_core::workflow::{WorkflowStep, WorkflowVersion};

use crate::error::{Result, StorageError};
use crate::sqlite::documents::{format_datetime, json_column, parse_column, parse_datetime};
use crate::sqlite::store::SqliteStore;

const VERSION_COLUMNS: &str = "id, name, version, template_id, status, created_at";

fn scan_version(row: &Row<'_>) -> rusqlite::Result<WorkflowVersion> {
    let created_at: String = row.get("created_at")?;
    Ok(WorkflowVersion {
        id: row.get("id")?,
        name: row.get("name")?,
        version: row.get("version")?,
        template_id: row.get("template_id")?,
        status: parse_column(row.get("status")?)?,
        steps: Vec::new(),
        created_at: parse_datetime(&created_at),
    })
}

fn scan_step(row: &Row<'_>) -> rusqlite::Result<WorkflowStep> {
    let signature_cell: Option<String> = row.get("signature_cell")?;
    let approved_date_cell: Option<String> = row.get("approved_date_cell")?;
    Ok(WorkflowStep {
        step_order: row.get("step_order")?,
        step_type: parse_column(row.get("step_type")?)?,
        approvers: json_column(row.get("approvers")?)?,
        signature_cell: signature_cell.map(parse_column::<CellRef>).transpose()?,
        approved_date_cell: approved_date_cell.map(parse_column::<CellRef>).transpose()?,
    })
}

fn load_steps(conn: &Connection, version: &mut WorkflowVersion) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT step_order, step_type, approvers, signature_cell, approved_date_cell
         FROM workflow_steps WHERE workflow_version_id = ?1 ORDER BY step_order",
    )?;
    let rows = stmt.query_map(params![version.id], scan_step)?;
    version.steps.clear();
    for row in rows {
        version.steps.push(row?);
    }
    Ok(())
}

pub(crate) fn get_workflow_version_on_conn(conn: &Connection, id: i64) -> Result<WorkflowVersion> {
    let sql = format!("SELECT {VERSION_COLUMNS} FROM workflow_versions WHERE id = ?1");
    let mut version = conn
        .query_row(&sql, params![id], scan_version)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StorageError::not_found("workflow version", id.to_string())
            }
            other => StorageError::Query(other),
        })?;
    load_steps(conn, &mut version)?;
    Ok(version)
}

fn list_versions_on_conn(conn: &Connection, sql: &str, p: &[&dyn rusqlite::types::ToSql]) -> Result<Vec<WorkflowVersion>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(p, scan_version)?;
    let mut versions = Vec::new();
    for row in rows {
        versions.push(row?);
    }
    for version in &mut versions {
        load_steps(conn, version)?;
    }
    Ok(versions)
}

impl SqliteStore {
    pub fn create_workflow_version_impl(
        &self,
        name: &str,
        template_id: i64,
        steps: &[WorkflowStep],
        created_at: DateTime<Utc>,
    ) -> Result<WorkflowVersion> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(StorageError::begin_failed)?;

        let version: u32 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM workflow_versions WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO workflow_versions (name, version, template_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                version,
                template_id,
                VersionStatus::Draft.as_str(),
                format_datetime(&created_at),
            ],
        )?;
        let id = tx.last_insert_rowid();

        for step in steps {
            tx.execute(
                "INSERT INTO workflow_steps
                    (workflow_version_id, step_order, step_type, approvers, signature_cell, approved_date_cell)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id,
                    step.step_order,
                    step.step_type.as_str(),
                    serde_json::to_string(&step.approvers)?,
                    step.signature_cell.as_ref().map(CellRef::to_string),
                    step.approved_date_cell.as_ref().map(CellRef::to_string),
                ],
            )?;
        }

        let created = get_workflow_version_on_conn(&tx, id)?;
        tx.commit()
            .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))?;
        Ok(created)
    }

    pub fn get_workflow_version_impl(&self, id: i64) -> Result<WorkflowVersion> {
        let conn = self.lock_conn()?;
        get_workflow_version_on_conn(&conn, id)
    }

    pub fn get_published_workflow_impl(&self, template_id: i64) -> Result<WorkflowVersion> {
        let conn = self.lock_conn()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM workflow_versions
                 WHERE template_id = ?1 AND status = 'published'
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![template_id],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => get_workflow_version_on_conn(&conn, id),
            None => Err(StorageError::not_found(
                "published workflow",
                format!("template {template_id}"),
            )),
        }
    }

    pub fn list_workflow_versions_impl(
        &self,
        template_id: Option<i64>,
    ) -> Result<Vec<WorkflowVersion>> {
        let conn = self.lock_conn()?;
        match template_id {
            Some(t) => list_versions_on_conn(
                &conn,
                &format!(
                    "SELECT {VERSION_COLUMNS} FROM workflow_versions WHERE template_id = ?1 ORDER BY name, version"
                ),
                &[&t],
            ),
            None => list_versions_on_conn(
                &conn,
                &format!("SELECT {VERSION_COLUMNS} FROM workflow_versions ORDER BY name, version"),
                &[],
            ),
        }
    }

    pub fn publish_workflow_version_impl(&self, id: i64) -> Result<WorkflowVersion> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(StorageError::begin_failed)?;

        let version = get_workflow_version_on_conn(&tx, id)?;
        if !version.can_publish() {
            return Err(StorageError::validation(format!(
                "workflow version {} cannot be published (status {}, {} step(s))",
                version.label(),
                version.status,
                version.steps.len()
            )));
        }

        let archived = tx.execute(
            "UPDATE workflow_versions SET status = 'archived'
             WHERE name = ?1 AND template_id = ?2 AND status = 'published' AND id != ?3",
            params![version.name, version.template_id, id],
        )?;
        tx.execute(
            "UPDATE workflow_versions SET status = 'published' WHERE id = ?1",
            params![id],
        )?;
        let published = get_workflow_version_on_conn(&tx, id)?;
        tx.commit()
            .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))?;

        info!(version = %published.label(), archived, "workflow version published");
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::enums::StepType;
    use docflow_core::template::{Sheet, Template};
    use pretty_assertions::assert_eq;

    fn store_with_template() -> (SqliteStore, i64) {
        let store = SqliteStore::open_in_memory().unwrap();
        let id = store
            .create_template_impl(&Template::new("T", vec![Sheet::new("Main", "")], Utc::now()))
            .unwrap();
        (store, id)
    }

    fn steps() -> Vec<WorkflowStep> {
        let mut approve = WorkflowStep::new(2, StepType::Approve).with_approvers(["carol", "dave"]);
        approve.signature_cell = Some(CellRef::new("Main", "F1"));
        vec![
            WorkflowStep::new(1, StepType::Checking).with_approvers(["bob"]),
            approve,
        ]
    }

    #[test]
    fn versions_count_up_per_name() {
        let (store, t) = store_with_template();
        let v1 = store.create_workflow_version_impl("std", t, &steps(), Utc::now()).unwrap();
        let v2 = store.create_workflow_version_impl("std", t, &steps(), Utc::now()).unwrap();
        let other = store.create_workflow_version_impl("fast", t, &steps(), Utc::now()).unwrap();
        assert_eq!((v1.version, v2.version, other.version), (1, 2, 1));
        assert_eq!(v1.status, VersionStatus::Draft);

        let loaded = store.get_workflow_version_impl(v2.id).unwrap();
        assert_eq!(loaded.steps, steps());
        assert_eq!(store.list_workflow_versions_impl(Some(t)).unwrap().len(), 3);
    }

    #[test]
    fn publish_archives_previous() {
        let (store, t) = store_with_template();
        let v1 = store.create_workflow_version_impl("std", t, &steps(), Utc::now()).unwrap();
        let v2 = store.create_workflow_version_impl("std", t, &steps(), Utc::now()).unwrap();

        assert!(store.get_published_workflow_impl(t).unwrap_err().is_not_found());
        store.publish_workflow_version_impl(v1.id).unwrap();
        assert_eq!(store.get_published_workflow_impl(t).unwrap().id, v1.id);

        let published = store.publish_workflow_version_impl(v2.id).unwrap();
        assert_eq!(published.status, VersionStatus::Published);
        assert_eq!(
            store.get_workflow_version_impl(v1.id).unwrap().status,
            VersionStatus::Archived
        );
        assert_eq!(store.get_published_workflow_impl(t).unwrap().id, v2.id);

        // Only drafts can be published.
        let err = store.publish_workflow_version_impl(v1.id).unwrap_err();
        assert!(matches!(err, StorageError::Validation { .. }));
    }

    #[test]
    fn empty_version_cannot_be_published() {
        let (store, t) = store_with_template();
        let v = store.create_workflow_version_impl("bare", t, &[], Utc::now()).unwrap();
        assert!(store.publish_workflow_version_impl(v.id).is_err());
    }
}
