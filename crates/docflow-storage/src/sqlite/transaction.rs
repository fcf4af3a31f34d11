//! Transaction wrapper for [`SqliteStore`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};

use docflow_core::activity::ActivityEntry;
use docflow_core::approver::{ApproverUpdates, DocumentApprover};
use docflow_core::document::Document;
use docflow_core::filter::ApproverFilter;
use docflow_core::template::Template;
use docflow_core::user::User;
use docflow_core::workflow::WorkflowVersion;

use crate::error::{Result, StorageError};
use crate::sqlite::activity;
use crate::sqlite::approvers;
use crate::sqlite::documents;
use crate::sqlite::store::SqliteStore;
use crate::sqlite::templates;
use crate::sqlite::users;
use crate::sqlite::workflows;
use crate::traits::{DocumentUpdates, Transaction};

/// A connection that is inside an open transaction.
///
/// Implements [`Transaction`] by delegating to the same connection-level
/// helpers used by [`SqliteStore`].
pub(crate) struct SqliteTx<'a> {
    pub(crate) conn: &'a Connection,
}

impl Transaction for SqliteTx<'_> {
    fn get_user(&self, id: &str) -> Result<User> {
        users::get_user_on_conn(self.conn, id)
    }

    fn get_template(&self, id: i64) -> Result<Template> {
        templates::get_template_on_conn(self.conn, id)
    }

    fn get_workflow_version(&self, id: i64) -> Result<WorkflowVersion> {
        workflows::get_workflow_version_on_conn(self.conn, id)
    }

    fn get_document(&self, id: &str) -> Result<Document> {
        documents::get_document_on_conn(self.conn, id)
    }

    fn update_document(&self, id: &str, updates: &DocumentUpdates) -> Result<()> {
        documents::update_document_on_conn(self.conn, id, updates)
    }

    fn find_approvers(&self, filter: &ApproverFilter) -> Result<Vec<DocumentApprover>> {
        approvers::find_approvers_on_conn(self.conn, filter)
    }

    fn insert_approvers(&self, rows: &[DocumentApprover]) -> Result<Vec<i64>> {
        approvers::insert_approvers_on_conn(self.conn, rows)
    }

    fn update_approver(&self, id: i64, updates: &ApproverUpdates) -> Result<()> {
        approvers::update_approver_on_conn(self.conn, id, updates)
    }

    fn mark_overdue_notified(&self, ids: &[i64], at: DateTime<Utc>) -> Result<usize> {
        approvers::mark_overdue_notified_on_conn(self.conn, ids, at)
    }

    fn log_activity(&self, entry: &ActivityEntry) -> Result<i64> {
        activity::insert_activity_on_conn(self.conn, entry)
    }
}

// ---------------------------------------------------------------------------
// SqliteStore::run_in_transaction
// ---------------------------------------------------------------------------

impl SqliteStore {
    /// Runs a closure inside an IMMEDIATE transaction, so the write lock is
    /// held from the first read and concurrent transitions on the same
    /// database serialise.
    pub fn run_in_transaction_impl(
        &self,
        f: &dyn Fn(&dyn Transaction) -> Result<()>,
    ) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::begin_failed)?;

        let sqlite_tx = SqliteTx { conn: &tx };
        f(&sqlite_tx)?;
        tx.commit()
            .map_err(|e| StorageError::Transaction(format!("failed to commit: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::documents::tests::{draft, seeded_store};
    use docflow_core::enums::{ActivityAction, DocumentStatus, StepType};

    #[test]
    fn transaction_commit() {
        let (store, t, v) = seeded_store();
        store.create_document_impl(&draft("doc-tx1", t, v), "alice").unwrap();

        store
            .run_in_transaction_impl(&|tx| {
                let doc = tx.get_document("doc-tx1")?;
                tx.update_document(
                    &doc.id,
                    &DocumentUpdates {
                        status: Some(DocumentStatus::Pending),
                        current_step: Some(1),
                        round: Some(1),
                        ..Default::default()
                    },
                )?;
                tx.insert_approvers(&[DocumentApprover::pending(
                    &doc.id,
                    1,
                    1,
                    StepType::Approve,
                    "carol",
                    Utc::now(),
                )])?;
                tx.log_activity(&ActivityEntry::new(
                    &doc.id,
                    ActivityAction::Submitted,
                    "alice",
                    Utc::now(),
                ))?;
                Ok(())
            })
            .unwrap();

        let doc = store.get_document_impl("doc-tx1").unwrap();
        assert_eq!(doc.status, DocumentStatus::Pending);
        let rows = store
            .find_approvers_impl(&ApproverFilter::for_step("doc-tx1", 1, 1))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(store.get_activity_impl("doc-tx1").unwrap().len(), 2);
    }

    #[test]
    fn transaction_rollback_on_error() {
        let (store, t, v) = seeded_store();
        store.create_document_impl(&draft("doc-tx2", t, v), "alice").unwrap();

        let result = store.run_in_transaction_impl(&|tx| {
            tx.update_document(
                "doc-tx2",
                &DocumentUpdates {
                    status: Some(DocumentStatus::Rejected),
                    ..Default::default()
                },
            )?;
            Err(StorageError::Aborted)
        });
        assert!(matches!(result, Err(StorageError::Aborted)));

        let doc = store.get_document_impl("doc-tx2").unwrap();
        assert_eq!(doc.status, DocumentStatus::Draft);
    }

    #[test]
    fn transaction_reads_workflow_and_template() {
        let (store, t, v) = seeded_store();
        store
            .run_in_transaction_impl(&|tx| {
                assert_eq!(tx.get_workflow_version(v)?.steps.len(), 1);
                assert_eq!(tx.get_template(t)?.name, "Purchase");
                assert!(tx.get_user("nobody").unwrap_err().is_not_found());
                Ok(())
            })
            .unwrap();
    }
}
