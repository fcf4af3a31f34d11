//! Approval workflow for docflow documents.
//!
//! [`ApprovalEngine`] moves documents through the steps of their workflow
//! version, [`OverdueDetector`] reminds approvers who have sat on a step too
//! long, and [`Notifier`] backends deliver the resulting messages.

pub mod engine;
pub mod error;
pub mod notify;
pub mod overdue;

#[cfg(test)]
mod fixtures;

pub use engine::{ApprovalEngine, DEFAULT_DATE_FORMAT, DEFAULT_ID_PREFIX};
pub use error::{Result, WorkflowError};
pub use notify::{LogNotifier, Notification, Notifier, NotifyError, OutboxNotifier, WebhookNotifier};
pub use overdue::{DEFAULT_THRESHOLD_DAYS, OverdueDetector, ReminderReport, SentReminder, wait_since};
