//! Storage and Transaction traits -- the public API for docflow persistence.
//!
//! The approval engine and the CLI depend on these traits rather than on
//! [`SqliteStore`](crate::SqliteStore) so tests can substitute other backends.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docflow_core::activity::ActivityEntry;
use docflow_core::approver::{ApproverUpdates, DocumentApprover};
use docflow_core::document::{Assignments, Document};
use docflow_core::enums::{DocumentStatus, NotificationKind};
use docflow_core::filter::{ApproverFilter, DocumentFilter};
use docflow_core::form_data::FormData;
use docflow_core::template::Template;
use docflow_core::user::User;
use docflow_core::workflow::{WorkflowStep, WorkflowVersion};

use crate::error::Result;

// ---------------------------------------------------------------------------
// View / helper types
// ---------------------------------------------------------------------------

/// Typed partial update for documents.
///
/// Only `Some` fields are applied. The doubly-optional timestamps clear the
/// column with `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdates {
    pub title: Option<String>,
    pub status: Option<DocumentStatus>,
    pub current_step: Option<u32>,
    pub round: Option<u32>,
    pub assignments: Option<Assignments>,
    pub form_data: Option<FormData>,
    pub submitted_at: Option<Option<DateTime<Utc>>>,
    pub approved_at: Option<Option<DateTime<Utc>>>,
    /// Defaults to the wall clock when unset.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DocumentUpdates {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.status.is_none()
            && self.current_step.is_none()
            && self.round.is_none()
            && self.assignments.is_none()
            && self.form_data.is_none()
            && self.submitted_at.is_none()
            && self.approved_at.is_none()
    }
}

/// A message appended to the notification outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    #[serde(default)]
    pub id: i64,
    pub kind: NotificationKind,
    pub recipient: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// Persistent store for users, templates, workflows, documents and their
/// approver rows.
pub trait Storage: Send + Sync {
    // -- Users ---------------------------------------------------------------

    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<User>;
    fn list_users(&self) -> Result<Vec<User>>;

    // -- Templates -----------------------------------------------------------

    /// Stores a template as the next draft version of its name and returns
    /// its assigned id.
    fn create_template(&self, template: &Template) -> Result<i64>;
    fn get_template(&self, id: i64) -> Result<Template>;
    fn list_templates(&self) -> Result<Vec<Template>>;

    /// Publishes a draft template version; see
    /// [`SqliteStore::publish_template_impl`](crate::SqliteStore::publish_template_impl).
    fn publish_template(&self, id: i64, now: DateTime<Utc>) -> Result<Template>;

    /// Archives a published template with an expiry time and reason.
    fn expire_template(&self, id: i64, reason: &str, at: DateTime<Utc>) -> Result<Template>;

    // -- Workflow versions ---------------------------------------------------

    /// Stores a new draft version of workflow `name`. Version numbers count
    /// up per name.
    fn create_workflow_version(
        &self,
        name: &str,
        template_id: i64,
        steps: &[WorkflowStep],
        created_at: DateTime<Utc>,
    ) -> Result<WorkflowVersion>;
    fn get_workflow_version(&self, id: i64) -> Result<WorkflowVersion>;

    /// The published version bound to `template_id`, newest first when
    /// several names are published.
    fn get_published_workflow(&self, template_id: i64) -> Result<WorkflowVersion>;
    fn list_workflow_versions(&self, template_id: Option<i64>) -> Result<Vec<WorkflowVersion>>;

    /// Publishes a draft version and archives every other published version
    /// of the same name and template.
    fn publish_workflow_version(&self, id: i64) -> Result<WorkflowVersion>;

    // -- Documents -----------------------------------------------------------

    /// Inserts a document and logs its `created` activity. A duplicate id
    /// yields [`StorageError::AlreadyExists`](crate::StorageError::AlreadyExists).
    fn create_document(&self, doc: &Document, actor: &str) -> Result<()>;
    fn get_document(&self, id: &str) -> Result<Document>;
    fn list_documents(&self, filter: &DocumentFilter) -> Result<Vec<Document>>;
    fn update_document(&self, id: &str, updates: &DocumentUpdates) -> Result<()>;

    // -- Approver rows -------------------------------------------------------

    fn find_approvers(&self, filter: &ApproverFilter) -> Result<Vec<DocumentApprover>>;

    /// Active pending rows on documents awaiting final approval that have
    /// never triggered a reminder.
    fn get_overdue_candidates(&self) -> Result<Vec<DocumentApprover>>;

    /// Active pending rows for `approver_id` across all documents awaiting
    /// final approval, reminded or not.
    fn count_active_pending(&self, approver_id: &str) -> Result<i64>;

    /// The most recently approved row at `step_order` of a document, in any
    /// round.
    fn get_previous_step_approval(
        &self,
        document_id: &str,
        step_order: u32,
    ) -> Result<Option<DocumentApprover>>;

    // -- Activity / outbox ---------------------------------------------------

    fn get_activity(&self, document_id: &str) -> Result<Vec<ActivityEntry>>;
    fn record_notification(&self, entry: &OutboxEntry) -> Result<i64>;
    fn list_notifications(&self, limit: Option<i64>) -> Result<Vec<OutboxEntry>>;

    // -- Database metadata ---------------------------------------------------

    fn set_metadata(&self, key: &str, value: &str) -> Result<()>;
    /// Every recorded fact, sorted by key.
    fn get_metadata(&self) -> Result<BTreeMap<String, String>>;

    // -- Transactions --------------------------------------------------------

    /// Runs `f` in one write transaction. Commits on `Ok`, rolls back on
    /// `Err`.
    fn run_in_transaction(&self, f: &dyn Fn(&dyn Transaction) -> Result<()>) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Transaction trait
// ---------------------------------------------------------------------------

/// Operations available inside [`Storage::run_in_transaction`].
pub trait Transaction {
    fn get_user(&self, id: &str) -> Result<User>;
    fn get_template(&self, id: i64) -> Result<Template>;
    fn get_workflow_version(&self, id: i64) -> Result<WorkflowVersion>;

    fn get_document(&self, id: &str) -> Result<Document>;
    fn update_document(&self, id: &str, updates: &DocumentUpdates) -> Result<()>;

    fn find_approvers(&self, filter: &ApproverFilter) -> Result<Vec<DocumentApprover>>;

    /// Inserts fresh approver rows and returns their ids in order.
    fn insert_approvers(&self, rows: &[DocumentApprover]) -> Result<Vec<i64>>;
    fn update_approver(&self, id: i64, updates: &ApproverUpdates) -> Result<()>;

    /// Stamps `overdue_notified_at` on rows that have none yet. Returns the
    /// number stamped.
    fn mark_overdue_notified(&self, ids: &[i64], at: DateTime<Utc>) -> Result<usize>;

    fn log_activity(&self, entry: &ActivityEntry) -> Result<i64>;
}
