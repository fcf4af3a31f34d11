//! Batch detection of stalled approvals.
//!
//! One run sends at most one grouped reminder per approver and stamps every
//! assignment it covered, so a pending assignment is reminded about once.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use docflow_core::approver::DocumentApprover;
use docflow_core::document::Document;
use docflow_storage::Storage;

use crate::error::Result;
use crate::notify::{ApproverIdentity, DocumentSummary, Notification, Notifier, OverdueDocument, OverdueReminder};

pub const DEFAULT_THRESHOLD_DAYS: i64 = 3;

/// When `approver`'s assignment became actionable.
///
/// Step 1 waits from submission. Later steps wait from the latest approval
/// of the step before; `None` when that record is missing.
pub fn wait_since(
    store: &dyn Storage,
    approver: &DocumentApprover,
    doc: &Document,
) -> Result<Option<DateTime<Utc>>> {
    if approver.step_order <= 1 {
        return Ok(doc.submitted_at);
    }
    let previous = store.get_previous_step_approval(&doc.id, approver.step_order - 1)?;
    Ok(previous.and_then(|row| row.approved_at))
}

/// One reminder that was delivered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentReminder {
    pub approver_id: String,
    pub document_ids: Vec<String>,
    pub total_pending: i64,
}

/// Outcome of one detector run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReminderReport {
    /// Unreminded active assignments inspected.
    pub candidates: usize,
    /// Reminders delivered (one per approver).
    pub sent: usize,
    /// Approvers skipped for lack of an address.
    pub skipped_no_email: usize,
    /// Assignments that could not be read plus deliveries that failed;
    /// their rows stay unstamped for the next run.
    pub failed: usize,
    pub reminders: Vec<SentReminder>,
}

#[derive(Debug, Clone)]
pub struct OverdueDetector {
    threshold: Duration,
}

impl Default for OverdueDetector {
    fn default() -> Self {
        Self::new(Duration::days(DEFAULT_THRESHOLD_DAYS))
    }
}

impl OverdueDetector {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// Sends grouped reminders for every assignment waiting at least the
    /// threshold as of `now`.
    ///
    /// A storage error for one assignment or approver is logged and counted
    /// and the rest of the batch carries on, as do delivery and stamping
    /// failures. Only a failure to read the candidate set aborts the run.
    pub fn run(
        &self,
        store: &dyn Storage,
        notifier: &dyn Notifier,
        now: DateTime<Utc>,
    ) -> Result<ReminderReport> {
        let candidates = store.get_overdue_candidates()?;
        let mut report = ReminderReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        let mut documents: HashMap<String, Document> = HashMap::new();
        let mut grouped: BTreeMap<String, Vec<(DocumentApprover, OverdueDocument)>> = BTreeMap::new();
        for row in candidates {
            if !documents.contains_key(&row.document_id) {
                match store.get_document(&row.document_id) {
                    Ok(doc) => {
                        documents.insert(doc.id.clone(), doc);
                    }
                    Err(e) => {
                        warn!(document_id = %row.document_id, approver_id = %row.approver_id, error = %e, "cannot load document, skipping");
                        report.failed += 1;
                        continue;
                    }
                }
            }
            let Some(doc) = documents.get(&row.document_id) else {
                continue;
            };
            let since = match wait_since(store, &row, doc) {
                Ok(Some(since)) => since,
                Ok(None) => {
                    debug!(document_id = %doc.id, approver_id = %row.approver_id, "wait start unknown, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(document_id = %doc.id, approver_id = %row.approver_id, error = %e, "cannot resolve wait start, skipping");
                    report.failed += 1;
                    continue;
                }
            };
            let waited = now - since;
            if waited < self.threshold {
                continue;
            }
            let entry = OverdueDocument {
                document: DocumentSummary::from(doc),
                step_order: row.step_order,
                waiting_since: since,
                days_waiting: waited.num_days(),
            };
            grouped
                .entry(row.approver_id.clone())
                .or_default()
                .push((row, entry));
        }

        for (approver_id, items) in grouped {
            let user = match store.get_user(&approver_id) {
                Ok(user) => user,
                Err(e) if e.is_not_found() => {
                    debug!(approver_id = %approver_id, "approver not registered, skipping");
                    report.skipped_no_email += 1;
                    continue;
                }
                Err(e) => {
                    warn!(approver_id = %approver_id, error = %e, "cannot load approver, skipping");
                    report.failed += 1;
                    continue;
                }
            };
            let Some(address) = user.notify_address() else {
                debug!(approver_id = %approver_id, "no email address, skipping");
                report.skipped_no_email += 1;
                continue;
            };

            let total_pending = match store.count_active_pending(&approver_id) {
                Ok(n) => n,
                Err(e) => {
                    warn!(approver_id = %approver_id, error = %e, "cannot count pending assignments, skipping");
                    report.failed += 1;
                    continue;
                }
            };
            let (rows, overdue): (Vec<_>, Vec<_>) = items.into_iter().unzip();
            let document_ids: Vec<String> = overdue.iter().map(|d| d.document.id.clone()).collect();
            let notification = Notification::OverdueReminder(OverdueReminder {
                approver: ApproverIdentity::from(&user),
                documents: overdue,
                total_pending,
            });

            if let Err(e) = notifier.send(address, &notification) {
                warn!(approver_id = %approver_id, error = %e, "overdue reminder delivery failed");
                report.failed += 1;
                continue;
            }

            let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
            if let Err(e) = store.run_in_transaction(&|tx| {
                tx.mark_overdue_notified(&ids, now)?;
                Ok(())
            }) {
                warn!(approver_id = %approver_id, error = %e, "failed to stamp reminded assignments");
            }

            info!(
                approver_id = %approver_id,
                documents = document_ids.len(),
                total_pending,
                "overdue reminder sent"
            );
            report.sent += 1;
            report.reminders.push(SentReminder {
                approver_id,
                document_ids,
                total_pending,
            });
        }

        info!("completed, sent {} reminder(s)", report.sent);
        Ok(report)
    }
}
