//! Storage backend for docflow.
//!
//! Provides the [`Storage`] trait and a SQLite implementation ([`SqliteStore`]).

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StorageError};
pub use sqlite::SqliteStore;
pub use traits::{DocumentUpdates, OutboxEntry, Storage, Transaction};

// ---------------------------------------------------------------------------
// Storage trait implementation for SqliteStore
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use docflow_core::activity::ActivityEntry;
use docflow_core::approver::DocumentApprover;
use docflow_core::document::Document;
use docflow_core::filter::{ApproverFilter, DocumentFilter};
use docflow_core::template::Template;
use docflow_core::user::User;
use docflow_core::workflow::{WorkflowStep, WorkflowVersion};

impl Storage for SqliteStore {
    fn create_user(&self, user: &User) -> Result<()> {
        self.create_user_impl(user)
    }

    fn get_user(&self, id: &str) -> Result<User> {
        self.get_user_impl(id)
    }

    fn list_users(&self) -> Result<Vec<User>> {
        self.list_users_impl()
    }

    fn create_template(&self, template: &Template) -> Result<i64> {
        self.create_template_impl(template)
    }

    fn get_template(&self, id: i64) -> Result<Template> {
        self.get_template_impl(id)
    }

    fn list_templates(&self) -> Result<Vec<Template>> {
        self.list_templates_impl()
    }

    fn publish_template(&self, id: i64, now: DateTime<Utc>) -> Result<Template> {
        self.publish_template_impl(id, now)
    }

    fn expire_template(&self, id: i64, reason: &str, at: DateTime<Utc>) -> Result<Template> {
        self.expire_template_impl(id, reason, at)
    }

    fn create_workflow_version(
        &self,
        name: &str,
        template_id: i64,
        steps: &[WorkflowStep],
        created_at: DateTime<Utc>,
    ) -> Result<WorkflowVersion> {
        self.create_workflow_version_impl(name, template_id, steps, created_at)
    }

    fn get_workflow_version(&self, id: i64) -> Result<WorkflowVersion> {
        self.get_workflow_version_impl(id)
    }

    fn get_published_workflow(&self, template_id: i64) -> Result<WorkflowVersion> {
        self.get_published_workflow_impl(template_id)
    }

    fn list_workflow_versions(&self, template_id: Option<i64>) -> Result<Vec<WorkflowVersion>> {
        self.list_workflow_versions_impl(template_id)
    }

    fn publish_workflow_version(&self, id: i64) -> Result<WorkflowVersion> {
        self.publish_workflow_version_impl(id)
    }

    fn create_document(&self, doc: &Document, actor: &str) -> Result<()> {
        self.create_document_impl(doc, actor)
    }

    fn get_document(&self, id: &str) -> Result<Document> {
        self.get_document_impl(id)
    }

    fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>> {
        self.list_documents_impl(filter)
    }

    fn update_document(&self, id: &str, updates: &DocumentUpdates) -> Result<()> {
        self.update_document_impl(id, updates)
    }

    fn find_approvers(&self, filter: &ApproverFilter) -> Result<Vec<DocumentApprover>> {
        self.find_approvers_impl(filter)
    }

    fn get_overdue_candidates(&self) -> Result<Vec<DocumentApprover>> {
        self.get_overdue_candidates_impl()
    }

    fn count_active_pending(&self, approver_id: &str) -> Result<i64> {
        self.count_active_pending_impl(approver_id)
    }

    fn get_previous_step_approval(
        &self,
        document_id: &str,
        step_order: u32,
    ) -> Result<Option<DocumentApprover>> {
        self.get_previous_step_approval_impl(document_id, step_order)
    }

    fn get_activity(&self, document_id: &str) -> Result<Vec<ActivityEntry>> {
        self.get_activity_impl(document_id)
    }

    fn record_notification(&self, entry: &OutboxEntry) -> Result<i64> {
        self.record_notification_impl(entry)
    }

    fn list_notifications(&self, limit: Option<i64>) -> Result<Vec<OutboxEntry>> {
        self.list_notifications_impl(limit)
    }

    fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.set_metadata_impl(key, value)
    }

    fn get_metadata(&self) -> Result<BTreeMap<String, String>> {
        self.get_metadata_impl()
    }

    fn run_in_transaction(&self, f: &dyn Fn(&dyn Transaction) -> Result<()>) -> Result<()> {
        self.run_in_transaction_impl(f)
    }
}
