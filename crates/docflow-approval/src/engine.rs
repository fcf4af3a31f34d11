//! The approval state machine.
//!
//! Every transition reads and writes inside one storage transaction, so the
//! document status and its approver rows always change together. Messages
//! produced by a transition are dispatched only after it commits.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use docflow_core::activity::ActivityEntry;
use docflow_core::approver::{ApproverUpdates, DocumentApprover};
use docflow_core::document::{Assignments, Document, DocumentBuilder};
use docflow_core::enums::{ActivityAction, ApprovalStatus, DocumentStatus, NotificationKind, StepType};
use docflow_core::filter::ApproverFilter;
use docflow_core::form_data::FormData;
use docflow_core::idgen::{MAX_ID_LENGTH, MIN_ID_LENGTH, generate_document_id};
use docflow_core::validation::validate_document;
use docflow_core::workflow::{WorkflowStep, WorkflowVersion};
use docflow_storage::{DocumentUpdates, Storage, StorageError, Transaction};

use crate::error::{Result, WorkflowError};
use crate::notify::{DocumentEvent, DocumentSummary, Notification, Notifier};

/// Default format for approved-date cells.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%m/%Y";

/// Default prefix for generated document ids.
pub const DEFAULT_ID_PREFIX: &str = "doc";

const ID_NONCE_ATTEMPTS: u32 = 10;

/// A message addressed to a user id, resolved to an address at dispatch.
#[derive(Debug, Clone)]
struct Notice {
    recipient_id: String,
    notification: Notification,
}

/// Drives documents through their workflow versions.
pub struct ApprovalEngine<'a> {
    store: &'a dyn Storage,
    notifier: &'a dyn Notifier,
    date_format: String,
    id_prefix: String,
}

impl<'a> ApprovalEngine<'a> {
    pub fn new(store: &'a dyn Storage, notifier: &'a dyn Notifier) -> Self {
        Self {
            store,
            notifier,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
        }
    }

    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    /// Creates a draft document bound to `template_id`, which must be a
    /// published, unexpired template version.
    ///
    /// Without an explicit `workflow_version_id` the template's published
    /// workflow version is used.
    pub fn create_document(
        &self,
        title: &str,
        template_id: i64,
        workflow_version_id: Option<i64>,
        creator: &str,
        now: DateTime<Utc>,
    ) -> Result<Document> {
        let template = self.store.get_template(template_id)?;
        if !template.accepts_documents(now) {
            let reason = match &template.expired_reason {
                Some(why) if template.is_expired(now) => format!("expired: {why}"),
                _ if template.is_expired(now) => "expired".to_string(),
                _ => template.status.to_string(),
            };
            return Err(WorkflowError::TemplateUnavailable {
                template: template.label(),
                reason,
            });
        }
        self.store.get_user(creator)?;
        let version = match workflow_version_id {
            Some(id) => self.store.get_workflow_version(id)?,
            None => self.store.get_published_workflow(template_id)?,
        };
        if version.template_id != template_id {
            return Err(StorageError::validation(format!(
                "workflow {} belongs to template {}, not {template_id}",
                version.label(),
                version.template_id
            ))
            .into());
        }

        let mut doc = DocumentBuilder::new(title.trim())
            .template(template_id)
            .workflow_version(version.id)
            .creator(creator)
            .created_at(now)
            .build();
        validate_document(&doc)?;

        for length in MIN_ID_LENGTH..=MAX_ID_LENGTH {
            for nonce in 0..ID_NONCE_ATTEMPTS {
                doc.id = generate_document_id(&self.id_prefix, &doc.title, creator, now, length, nonce);
                match self.store.create_document(&doc, creator) {
                    Ok(()) => {
                        info!(document_id = %doc.id, workflow = %version.label(), "document created");
                        return Ok(doc);
                    }
                    Err(e) if e.is_already_exists() => {
                        debug!(document_id = %doc.id, "id collision, retrying");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Err(WorkflowError::Internal(
            "could not generate a unique document id".to_string(),
        ))
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Sends a draft into its first step.
    ///
    /// `overrides` replaces the step-defined approvers for the steps it
    /// names; every step must end up with at least one assignee.
    pub fn submit(
        &self,
        document_id: &str,
        actor: &str,
        overrides: &Assignments,
        now: DateTime<Utc>,
    ) -> Result<Document> {
        let (doc, notices) = self.in_transaction(|tx| {
            let doc = tx.get_document(document_id)?;
            if doc.status != DocumentStatus::Draft {
                return Err(invalid_state(&doc, "submit"));
            }
            require_creator(&doc, actor, "submit")?;

            let version = tx.get_workflow_version(doc.workflow_version_id)?;
            let assignments = resolve_assignments(&version, overrides)?;
            let first = version
                .first_step()
                .ok_or(WorkflowError::MissingStep { step_order: 1 })?;
            let assignees = assignments
                .get(&first.step_order)
                .cloned()
                .unwrap_or_default();

            let round = doc.round + 1;
            let rows: Vec<_> = assignees
                .iter()
                .map(|a| DocumentApprover::pending(&doc.id, round, first.step_order, first.step_type, a, now))
                .collect();
            tx.insert_approvers(&rows)?;

            let status = DocumentStatus::for_step(first.step_type, false);
            tx.update_document(
                &doc.id,
                &DocumentUpdates {
                    status: Some(status),
                    current_step: Some(first.step_order),
                    round: Some(round),
                    assignments: Some(assignments.clone()),
                    submitted_at: Some(Some(now)),
                    approved_at: Some(None),
                    updated_at: Some(now),
                    ..Default::default()
                },
            )?;
            tx.log_activity(
                &ActivityEntry::new(&doc.id, ActivityAction::Submitted, actor, now)
                    .transition(doc.status, status)
                    .step(first.step_order),
            )?;

            let updated = tx.get_document(&doc.id)?;
            let notices = requested_notices(&updated, first, &assignees, actor);
            Ok((updated, notices))
        })?;

        info!(document_id, status = %doc.status, "document submitted");
        self.dispatch(&notices);
        Ok(doc)
    }

    /// Records `actor`'s approval of the active step, advancing or
    /// finishing the document once every assignee has approved.
    pub fn approve(
        &self,
        document_id: &str,
        actor: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Document> {
        let (doc, notices) = self.in_transaction(|tx| {
            let doc = tx.get_document(document_id)?;
            if !doc.status.is_in_flight() {
                return Err(invalid_state(&doc, "approve"));
            }
            let rows = active_rows(tx, &doc)?;
            let mine = pending_row_for(&doc, &rows, actor)?;
            let version = tx.get_workflow_version(doc.workflow_version_id)?;
            let step = version.step(doc.current_step).ok_or(WorkflowError::MissingStep {
                step_order: doc.current_step,
            })?;

            tx.update_approver(
                mine.id,
                &ApproverUpdates {
                    status: Some(ApprovalStatus::Approved),
                    approved_at: Some(now),
                    comment: comment.clone(),
                    ..Default::default()
                },
            )?;

            let mut updates = DocumentUpdates {
                updated_at: Some(now),
                ..Default::default()
            };
            if let Some(form_data) = self.stamp_approval(&doc.form_data, step, actor, now)? {
                updates.form_data = Some(form_data);
            }

            let step_done = rows
                .iter()
                .all(|r| r.id == mine.id || r.status == ApprovalStatus::Approved);
            let mut notices = Vec::new();
            let new_status = if !step_done {
                DocumentStatus::for_step(step.step_type, true)
            } else if let Some(next) = version.next_step(step.step_order) {
                let assignees = step_assignees(&doc, next)?;
                let rows: Vec<_> = assignees
                    .iter()
                    .map(|a| DocumentApprover::pending(&doc.id, doc.round, next.step_order, next.step_type, a, now))
                    .collect();
                tx.insert_approvers(&rows)?;
                updates.current_step = Some(next.step_order);
                notices.push((next, assignees));
                DocumentStatus::for_step(next.step_type, false)
            } else {
                updates.approved_at = Some(Some(now));
                DocumentStatus::Approved
            };
            updates.status = Some(new_status);
            tx.update_document(&doc.id, &updates)?;
            tx.log_activity(
                &ActivityEntry::new(&doc.id, step.step_type.completion_action(), actor, now)
                    .transition(doc.status, new_status)
                    .step(step.step_order)
                    .comment(comment.clone()),
            )?;

            let updated = tx.get_document(&doc.id)?;
            let mut out = Vec::new();
            for (next, assignees) in notices {
                out.extend(requested_notices(&updated, next, &assignees, actor));
            }
            if new_status == DocumentStatus::Approved {
                out.push(event_notice(
                    &updated,
                    NotificationKind::Approved,
                    &updated.creator_id,
                    actor,
                    Some(step.step_order),
                    None,
                ));
            }
            Ok((updated, out))
        })?;

        info!(document_id, approver_id = actor, status = %doc.status, "approval recorded");
        self.dispatch(&notices);
        Ok(doc)
    }

    /// Rejects the document on behalf of an active approver. One rejection
    /// ends the workflow regardless of the other assignees.
    pub fn reject(
        &self,
        document_id: &str,
        actor: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Document> {
        let (doc, notices) = self.in_transaction(|tx| {
            let doc = tx.get_document(document_id)?;
            if !doc.status.is_in_flight() {
                return Err(invalid_state(&doc, "reject"));
            }
            let rows = active_rows(tx, &doc)?;
            let mine = pending_row_for(&doc, &rows, actor)?;

            tx.update_approver(
                mine.id,
                &ApproverUpdates {
                    status: Some(ApprovalStatus::Rejected),
                    rejected_at: Some(now),
                    comment: comment.clone(),
                    ..Default::default()
                },
            )?;
            tx.update_document(
                &doc.id,
                &DocumentUpdates {
                    status: Some(DocumentStatus::Rejected),
                    updated_at: Some(now),
                    ..Default::default()
                },
            )?;
            tx.log_activity(
                &ActivityEntry::new(&doc.id, ActivityAction::Rejected, actor, now)
                    .transition(doc.status, DocumentStatus::Rejected)
                    .step(doc.current_step)
                    .comment(comment.clone()),
            )?;

            let updated = tx.get_document(&doc.id)?;
            let notice = event_notice(
                &updated,
                NotificationKind::Rejected,
                &updated.creator_id,
                actor,
                Some(doc.current_step),
                comment.clone(),
            );
            Ok((updated, vec![notice]))
        })?;

        info!(document_id, approver_id = actor, "document rejected");
        self.dispatch(&notices);
        Ok(doc)
    }

    /// Pulls the document back one step (or to draft from step 1).
    ///
    /// Refused once the step before the active one, or the final step of an
    /// approved document, is of a type that forbids recall.
    pub fn recall(&self, document_id: &str, actor: &str, now: DateTime<Utc>) -> Result<Document> {
        let (doc, notices) = self.in_transaction(|tx| {
            let doc = tx.get_document(document_id)?;
            require_creator(&doc, actor, "recall")?;
            let version = tx.get_workflow_version(doc.workflow_version_id)?;

            match doc.status {
                DocumentStatus::Draft | DocumentStatus::Rejected => {
                    return Err(invalid_state(&doc, "recall"));
                }
                DocumentStatus::Approved => {
                    let step_type = version
                        .steps
                        .last()
                        .map(|s| s.step_type)
                        .unwrap_or(StepType::Approve);
                    return Err(WorkflowError::RecallNotPermitted { step_type });
                }
                _ => {}
            }

            let withdrawn: Vec<_> = active_rows(tx, &doc)?
                .into_iter()
                .filter(DocumentApprover::is_pending)
                .collect();
            let round = doc.round + 1;
            let mut updates = DocumentUpdates {
                round: Some(round),
                updated_at: Some(now),
                ..Default::default()
            };
            let mut reopened = None;

            let new_status = if doc.current_step <= 1 {
                updates.current_step = Some(0);
                updates.submitted_at = Some(None);
                DocumentStatus::Draft
            } else {
                let prev_order = doc.current_step - 1;
                let prev = version
                    .step(prev_order)
                    .ok_or(WorkflowError::MissingStep { step_order: prev_order })?;
                if !prev.step_type.can_recall_after_approve() {
                    return Err(WorkflowError::RecallNotPermitted {
                        step_type: prev.step_type,
                    });
                }
                let assignees = step_assignees(&doc, prev)?;
                let rows: Vec<_> = assignees
                    .iter()
                    .map(|a| DocumentApprover::pending(&doc.id, round, prev.step_order, prev.step_type, a, now))
                    .collect();
                tx.insert_approvers(&rows)?;
                updates.current_step = Some(prev.step_order);
                reopened = Some((prev, assignees));
                DocumentStatus::for_step(prev.step_type, false)
            };
            updates.status = Some(new_status);
            tx.update_document(&doc.id, &updates)?;
            tx.log_activity(
                &ActivityEntry::new(&doc.id, ActivityAction::Recalled, actor, now)
                    .transition(doc.status, new_status)
                    .step(doc.current_step),
            )?;

            let updated = tx.get_document(&doc.id)?;
            let mut notices: Vec<_> = withdrawn
                .iter()
                .map(|row| {
                    event_notice(
                        &updated,
                        NotificationKind::Recalled,
                        &row.approver_id,
                        actor,
                        Some(row.step_order),
                        None,
                    )
                })
                .collect();
            if let Some((step, assignees)) = reopened {
                notices.extend(requested_notices(&updated, step, &assignees, actor));
            }
            Ok((updated, notices))
        })?;

        info!(document_id, status = %doc.status, round = doc.round, "document recalled");
        self.dispatch(&notices);
        Ok(doc)
    }

    // -----------------------------------------------------------------------
    // Form save
    // -----------------------------------------------------------------------

    /// Merges `input` into the document's form, runs the template's
    /// calculation script over the result and stores it.
    ///
    /// A failing script leaves the stored form untouched.
    pub fn save_form(
        &self,
        document_id: &str,
        actor: &str,
        input: &FormData,
        now: DateTime<Utc>,
    ) -> Result<FormData> {
        self.in_transaction(|tx| {
            let doc = tx.get_document(document_id)?;
            match doc.status {
                DocumentStatus::Draft => require_creator(&doc, actor, "edit")?,
                // Only a prepare-type step produces this status.
                DocumentStatus::Prepare => {
                    let rows = active_rows(tx, &doc)?;
                    pending_row_for(&doc, &rows, actor)?;
                }
                _ => return Err(invalid_state(&doc, "edit")),
            }

            let template = tx.get_template(doc.template_id)?;
            let mut merged = doc.form_data.clone();
            merged.merge(input);
            let form_data = if template.calculation_script.trim().is_empty() {
                merged
            } else {
                docflow_formula::execute(&merged, &template.calculation_script)?
            };

            tx.update_document(
                &doc.id,
                &DocumentUpdates {
                    form_data: Some(form_data.clone()),
                    updated_at: Some(now),
                    ..Default::default()
                },
            )?;
            let mut entry = ActivityEntry::new(&doc.id, ActivityAction::Edited, actor, now);
            if doc.status.is_in_flight() {
                entry = entry.step(doc.current_step);
            }
            tx.log_activity(&entry)?;
            debug!(document_id, actor, "form saved");
            Ok(form_data)
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Runs `f` inside one storage transaction.
    ///
    /// Workflow errors abort the transaction and are handed back unchanged;
    /// storage errors pass straight through.
    fn in_transaction<T>(&self, f: impl Fn(&dyn Transaction) -> Result<T>) -> Result<T> {
        let outcome: RefCell<Option<Result<T>>> = RefCell::new(None);
        let committed = self.store.run_in_transaction(&|tx| match f(tx) {
            Ok(value) => {
                *outcome.borrow_mut() = Some(Ok(value));
                Ok(())
            }
            Err(WorkflowError::Storage(e)) => Err(e),
            Err(e) => {
                *outcome.borrow_mut() = Some(Err(e));
                Err(StorageError::Aborted)
            }
        });

        match (committed, outcome.into_inner()) {
            (Ok(()), Some(Ok(value))) => Ok(value),
            (Err(StorageError::Aborted), Some(Err(e))) => Err(e),
            (Err(e), _) => Err(e.into()),
            (Ok(()), _) => Err(WorkflowError::Internal(
                "transaction committed without a result".to_string(),
            )),
        }
    }

    /// Writes the signature and approval-date cells configured on `step`.
    fn stamp_approval(
        &self,
        form_data: &FormData,
        step: &WorkflowStep,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FormData>> {
        if step.signature_cell.is_none() && step.approved_date_cell.is_none() {
            return Ok(None);
        }
        let mut form_data = form_data.clone();
        if let Some(cell) = &step.signature_cell {
            form_data.set(
                cell,
                json!({
                    "type": "signature",
                    "approver_id": actor,
                    "signed_at": now.to_rfc3339(),
                }),
            );
        }
        if let Some(cell) = &step.approved_date_cell {
            let mut date = String::new();
            write!(date, "{}", now.format(&self.date_format)).map_err(|_| {
                WorkflowError::Internal(format!("invalid date format '{}'", self.date_format))
            })?;
            form_data.set(cell, date.into());
        }
        Ok(Some(form_data))
    }

    /// Delivers post-commit notices. Failures are logged and dropped.
    fn dispatch(&self, notices: &[Notice]) {
        for notice in notices {
            let user = match self.store.get_user(&notice.recipient_id) {
                Ok(user) => user,
                Err(e) => {
                    debug!(recipient = %notice.recipient_id, error = %e, "recipient not found, skipping");
                    continue;
                }
            };
            let Some(address) = user.notify_address() else {
                debug!(recipient = %user.id, "no email address, skipping");
                continue;
            };
            if let Err(e) = self.notifier.send(address, &notice.notification) {
                warn!(
                    recipient = %user.id,
                    kind = %notice.notification.kind(),
                    error = %e,
                    "notification delivery failed"
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

fn invalid_state(doc: &Document, action: &'static str) -> WorkflowError {
    WorkflowError::InvalidState {
        document_id: doc.id.clone(),
        status: doc.status,
        action,
    }
}

fn require_creator(doc: &Document, actor: &str, action: &'static str) -> Result<()> {
    if doc.creator_id == actor {
        Ok(())
    } else {
        Err(WorkflowError::NotCreator {
            document_id: doc.id.clone(),
            creator: doc.creator_id.clone(),
            action,
        })
    }
}

fn active_rows(tx: &dyn Transaction, doc: &Document) -> Result<Vec<DocumentApprover>> {
    Ok(tx.find_approvers(&ApproverFilter::for_step(&doc.id, doc.round, doc.current_step))?)
}

fn pending_row_for<'r>(
    doc: &Document,
    rows: &'r [DocumentApprover],
    actor: &str,
) -> Result<&'r DocumentApprover> {
    rows.iter()
        .find(|r| r.approver_id == actor && r.is_pending())
        .ok_or_else(|| WorkflowError::NotActiveApprover {
            document_id: doc.id.clone(),
            actor: actor.to_string(),
            step_order: doc.current_step,
        })
}

/// Assignees for `step`: the document's recorded list, else the step's own.
fn step_assignees(doc: &Document, step: &WorkflowStep) -> Result<Vec<String>> {
    let recorded = doc.assignees(step.step_order);
    let assignees = if recorded.is_empty() {
        &step.approvers
    } else {
        recorded
    };
    if assignees.is_empty() {
        return Err(WorkflowError::MissingStepApprovers {
            step_order: step.step_order,
        });
    }
    Ok(assignees.to_vec())
}

/// Resolves every step's assignees at submit time.
fn resolve_assignments(version: &WorkflowVersion, overrides: &Assignments) -> Result<Assignments> {
    if let Some(&step_order) = overrides.keys().find(|k| version.step(**k).is_none()) {
        return Err(WorkflowError::MissingStep { step_order });
    }
    let mut resolved = Assignments::new();
    for step in &version.steps {
        let source = overrides
            .get(&step.step_order)
            .filter(|ids| !ids.is_empty())
            .unwrap_or(&step.approvers);
        let mut seen = HashSet::new();
        let ids: Vec<String> = source
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty() && seen.insert(*id))
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Err(WorkflowError::MissingStepApprovers {
                step_order: step.step_order,
            });
        }
        resolved.insert(step.step_order, ids);
    }
    Ok(resolved)
}

fn event_notice(
    doc: &Document,
    kind: NotificationKind,
    recipient_id: &str,
    actor: &str,
    step_order: Option<u32>,
    comment: Option<String>,
) -> Notice {
    Notice {
        recipient_id: recipient_id.to_string(),
        notification: Notification::Document(DocumentEvent {
            kind,
            document: DocumentSummary::from(doc),
            actor: actor.to_string(),
            step_order,
            comment,
        }),
    }
}

/// "Please act" notices for everyone assigned to a step just entered.
fn requested_notices(
    doc: &Document,
    step: &WorkflowStep,
    assignees: &[String],
    actor: &str,
) -> Vec<Notice> {
    if !step.step_type.should_send_email() {
        return Vec::new();
    }
    let kind = match step.step_type {
        StepType::Checking => NotificationKind::CheckingRequested,
        _ => NotificationKind::ApprovalRequested,
    };
    assignees
        .iter()
        .map(|id| event_notice(doc, kind, id, actor, Some(step.step_order), None))
        .collect()
}
