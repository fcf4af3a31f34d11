//! Template versions for [`SqliteStore`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use docflow_core::enums::VersionStatus;
use docflow_core::template::Template;

use crate::error::{Result, StorageError};
use crate::sqlite::documents::{format_datetime, json_column, parse_column, parse_datetime};
use crate::sqlite::store::SqliteStore;

const TEMPLATE_COLUMNS: &str = "id, name, version, status, parent_id, sheets, calculation_script, \
     expired_at, expired_reason, created_at";

fn scan_template(row: &Row<'_>) -> rusqlite::Result<Template> {
    let created_at: String = row.get("created_at")?;
    let expired_at: Option<String> = row.get("expired_at")?;
    Ok(Template {
        id: row.get("id")?,
        name: row.get("name")?,
        version: row.get("version")?,
        status: parse_column(row.get("status")?)?,
        parent_id: row.get("parent_id")?,
        sheets: json_column(row.get("sheets")?)?,
        calculation_script: row.get("calculation_script")?,
        expired_at: expired_at.as_deref().map(parse_datetime),
        expired_reason: row.get("expired_reason")?,
        created_at: parse_datetime(&created_at),
    })
}

pub(crate) fn get_template_on_conn(conn: &Connection, id: i64) -> Result<Template> {
    let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?1");
    conn.query_row(&sql, params![id], scan_template)
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StorageError::not_found("template", id.to_string()),
            other => StorageError::Query(other),
        })
}

impl SqliteStore {
    /// Stores `template` as a new draft version of its name. The newest
    /// existing version of that name becomes its parent.
    pub fn create_template_impl(&self, template: &Template) -> Result<i64> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(StorageError::begin_failed)?;

        let latest: Option<(i64, u32)> = tx
            .query_row(
                "SELECT id, version FROM templates WHERE name = ?1
                 ORDER BY version DESC LIMIT 1",
                params![template.name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (parent_id, version) = match latest {
            Some((id, v)) => (Some(id), v + 1),
            None => (None, 1),
        };

        tx.execute(
            "INSERT INTO templates (name, version, status, parent_id, sheets, calculation_script, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                template.name,
                version,
                VersionStatus::Draft.as_str(),
                parent_id,
                serde_json::to_string(&template.sheets)?,
                template.calculation_script,
                format_datetime(&template.created_at),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()
            .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))?;
        Ok(id)
    }

    pub fn get_template_impl(&self, id: i64) -> Result<Template> {
        let conn = self.lock_conn()?;
        get_template_on_conn(&conn, id)
    }

    pub fn list_templates_impl(&self) -> Result<Vec<Template>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates ORDER BY name, version"
        ))?;
        let rows = stmt.query_map([], scan_template)?;
        let mut templates = Vec::new();
        for row in rows {
            templates.push(row?);
        }
        Ok(templates)
    }

    /// Publishes a draft that has at least one workflow version. Other
    /// published versions of the same name are archived as superseded.
    pub fn publish_template_impl(&self, id: i64, now: DateTime<Utc>) -> Result<Template> {
        let conn = self.lock_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(StorageError::begin_failed)?;

        let template = get_template_on_conn(&tx, id)?;
        if !template.can_publish() {
            return Err(StorageError::validation(format!(
                "template {} cannot be published (status {})",
                template.label(),
                template.status
            )));
        }
        let workflows: i64 = tx.query_row(
            "SELECT COUNT(*) FROM workflow_versions WHERE template_id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        if workflows == 0 {
            return Err(StorageError::validation(format!(
                "template {} has no workflow; import one before publishing",
                template.label()
            )));
        }

        let superseded = tx.execute(
            "UPDATE templates
             SET status = 'archived',
                 expired_at = COALESCE(expired_at, ?1),
                 expired_reason = COALESCE(expired_reason, ?2)
             WHERE name = ?3 AND status = 'published' AND id != ?4",
            params![
                format_datetime(&now),
                format!("Superseded by version {}", template.version),
                template.name,
                id
            ],
        )?;
        tx.execute(
            "UPDATE templates SET status = 'published' WHERE id = ?1",
            params![id],
        )?;
        let published = get_template_on_conn(&tx, id)?;
        tx.commit()
            .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))?;

        info!(template = %published.label(), superseded, "template published");
        Ok(published)
    }

    /// Retires a published template as of `at`, recording why. The version
    /// stays published so documents created before `at` are unaffected.
    pub fn expire_template_impl(&self, id: i64, reason: &str, at: DateTime<Utc>) -> Result<Template> {
        let conn = self.lock_conn()?;
        let template = get_template_on_conn(&conn, id)?;
        if !template.can_expire() {
            return Err(StorageError::validation(format!(
                "template {} cannot be expired (status {})",
                template.label(),
                template.status
            )));
        }
        conn.execute(
            "UPDATE templates SET expired_at = ?1, expired_reason = ?2 WHERE id = ?3",
            params![format_datetime(&at), reason, id],
        )?;
        info!(template = %template.label(), reason, "template expired");
        get_template_on_conn(&conn, id)
    }
}
