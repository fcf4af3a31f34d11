//! Shared setup for the engine and overdue tests.

use std::cell::RefCell;

use chrono::{DateTime, TimeZone, Utc};

use docflow_core::approver::DocumentApprover;
use docflow_core::document::{Assignments, Document};
use docflow_core::enums::NotificationKind;
use docflow_core::filter::ApproverFilter;
use docflow_core::template::{Sheet, Template};
use docflow_core::user::User;
use docflow_core::workflow::WorkflowStep;
use docflow_storage::{SqliteStore, Storage};

use crate::engine::ApprovalEngine;
use crate::notify::{Notification, Notifier, NotifyError};

pub(crate) const SCRIPT: &str = r#"total = getValue("Main:A1") + getValue("Main:A2"); setValue("Main:A3", total)"#;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

/// Keeps every message it is handed; optionally fails every send.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) sent: RefCell<Vec<(String, Notification)>>,
    pub(crate) fail: bool,
}

impl Notifier for RecordingNotifier {
    fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Http("connection refused".into()));
        }
        self.sent
            .borrow_mut()
            .push((recipient.to_string(), notification.clone()));
        Ok(())
    }
}

pub(crate) struct Fixture {
    pub(crate) store: SqliteStore,
    pub(crate) notifier: RecordingNotifier,
    pub(crate) template_id: i64,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::with_script(SCRIPT)
    }

    pub(crate) fn with_script(script: &str) -> Self {
        Self::with_store(SqliteStore::open_in_memory().unwrap(), script)
    }

    /// Same seed data in a database file other connections can reach.
    pub(crate) fn on_disk(path: &std::path::Path) -> Self {
        Self::with_store(SqliteStore::open(path).unwrap(), SCRIPT)
    }

    fn with_store(store: SqliteStore, script: &str) -> Self {
        for id in ["alice", "bob", "carol", "dave", "erin"] {
            store
                .create_user(&User::new(id, id).with_email(format!("{id}@example.com")))
                .unwrap();
        }
        store.create_user(&User::new("frank", "Frank")).unwrap();
        let template_id = store
            .create_template(
                &Template::new(
                    "Purchase",
                    vec![Sheet::new("Main", r#"[number a cell="A1"][number b cell="A2"]"#)],
                    t0(),
                )
                .with_calculation_script(script),
            )
            .unwrap();
        Self {
            store,
            notifier: RecordingNotifier::default(),
            template_id,
        }
    }

    /// Creates and publishes a workflow version, publishing the template
    /// too on first use; returns the version id.
    pub(crate) fn publish(&self, steps: &[WorkflowStep]) -> i64 {
        let version = self
            .store
            .create_workflow_version("std", self.template_id, steps, t0())
            .unwrap();
        let id = self.store.publish_workflow_version(version.id).unwrap().id;
        if self.store.get_template(self.template_id).unwrap().can_publish() {
            self.store.publish_template(self.template_id, t0()).unwrap();
        }
        id
    }

    pub(crate) fn engine(&self) -> ApprovalEngine<'_> {
        ApprovalEngine::new(&self.store, &self.notifier)
    }

    pub(crate) fn draft(&self) -> Document {
        self.engine()
            .create_document("Laptop order", self.template_id, None, "alice", t0())
            .unwrap()
    }

    pub(crate) fn submitted(&self) -> Document {
        let doc = self.draft();
        self.engine()
            .submit(&doc.id, "alice", &Assignments::new(), t0())
            .unwrap()
    }

    pub(crate) fn active_rows(&self, doc: &Document) -> Vec<DocumentApprover> {
        self.store
            .find_approvers(&ApproverFilter::for_step(&doc.id, doc.round, doc.current_step))
            .unwrap()
    }

    pub(crate) fn notifications(&self) -> Vec<(String, Notification)> {
        self.notifier.sent.borrow().clone()
    }

    pub(crate) fn sent(&self) -> Vec<(String, NotificationKind)> {
        self.notifications()
            .into_iter()
            .map(|(to, n)| (to, n.kind()))
            .collect()
    }
}
