//! Notification payloads and delivery backends.
//!
//! The engine only builds payloads and hands them to a [`Notifier`]; how a
//! message reaches its recipient is the backend's business.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use docflow_core::document::Document;
use docflow_core::enums::{DocumentStatus, NotificationKind};
use docflow_core::user::User;
use docflow_storage::{OutboxEntry, Storage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("webhook delivery failed: {0}")]
    Http(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub status: DocumentStatus,
    pub current_step: u32,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            title: doc.title.clone(),
            status: doc.status,
            current_step: doc.current_step,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApproverIdentity {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl From<&User> for ApproverIdentity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.notify_address().map(str::to_owned),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueDocument {
    pub document: DocumentSummary,
    pub step_order: u32,
    pub waiting_since: DateTime<Utc>,
    pub days_waiting: i64,
}

/// One grouped reminder for one approver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueReminder {
    pub approver: ApproverIdentity,
    pub documents: Vec<OverdueDocument>,
    /// Everything the approver has pending, overdue or not.
    pub total_pending: i64,
}

/// A lifecycle event on one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentEvent {
    pub kind: NotificationKind,
    pub document: DocumentSummary,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_order: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Notification {
    OverdueReminder(OverdueReminder),
    Document(DocumentEvent),
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::OverdueReminder(_) => NotificationKind::OverdueReminder,
            Self::Document(event) => event.kind,
        }
    }

    /// One-line summary suitable for a mail subject or log line.
    pub fn subject(&self) -> String {
        match self {
            Self::OverdueReminder(r) => format!(
                "{} document(s) overdue for your approval ({} pending in total)",
                r.documents.len(),
                r.total_pending
            ),
            Self::Document(e) => match e.kind {
                NotificationKind::ApprovalRequested => {
                    format!("Approval requested: {}", e.document.title)
                }
                NotificationKind::CheckingRequested => {
                    format!("Checking requested: {}", e.document.title)
                }
                NotificationKind::Approved => format!("Approved: {}", e.document.title),
                NotificationKind::Rejected => format!("Rejected: {}", e.document.title),
                NotificationKind::Recalled => format!("Recalled: {}", e.document.title),
                NotificationKind::OverdueReminder => {
                    format!("Overdue: {}", e.document.title)
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

/// Delivers a notification to one recipient address.
pub trait Notifier {
    fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log and nothing else.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            recipient,
            kind = %notification.kind(),
            subject = %notification.subject(),
            "notification"
        );
        Ok(())
    }
}

/// Appends notifications to the store's outbox table.
pub struct OutboxNotifier<'a> {
    store: &'a dyn Storage,
}

impl<'a> OutboxNotifier<'a> {
    pub fn new(store: &'a dyn Storage) -> Self {
        Self { store }
    }
}

impl Notifier for OutboxNotifier<'_> {
    fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        self.store.record_notification(&OutboxEntry {
            id: 0,
            kind: notification.kind(),
            recipient: recipient.to_owned(),
            payload: serde_json::to_value(notification)?,
            created_at: Utc::now(),
        })?;
        Ok(())
    }
}

/// POSTs `{"recipient", "kind", "subject", "payload"}` to a URL.
pub struct WebhookNotifier {
    url: String,
    agent: ureq::Agent,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            url: url.into(),
            agent,
        }
    }
}

impl Notifier for WebhookNotifier {
    fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        let body = json!({
            "recipient": recipient,
            "kind": notification.kind(),
            "subject": notification.subject(),
            "payload": notification,
        });
        self.agent
            .post(&self.url)
            .send_json(&body)
            .map_err(|e| NotifyError::Http(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::document::DocumentBuilder;
    use docflow_storage::SqliteStore;
    use pretty_assertions::assert_eq;

    fn event(kind: NotificationKind) -> Notification {
        let doc = DocumentBuilder::new("Laptop order").id("doc-1").creator("alice").build();
        Notification::Document(DocumentEvent {
            kind,
            document: DocumentSummary::from(&doc),
            actor: "carol".into(),
            step_order: Some(1),
            comment: None,
        })
    }

    #[test]
    fn subjects_and_kinds() {
        let n = event(NotificationKind::Rejected);
        assert_eq!(n.kind(), NotificationKind::Rejected);
        assert_eq!(n.subject(), "Rejected: Laptop order");
    }

    #[test]
    fn payload_shape() {
        let value = serde_json::to_value(event(NotificationKind::Approved)).unwrap();
        assert_eq!(value["kind"], "approved");
        assert_eq!(value["document"]["id"], "doc-1");
        assert_eq!(value["actor"], "carol");
        assert!(value.get("comment").is_none());
    }

    #[test]
    fn outbox_records_messages() {
        let store = SqliteStore::open_in_memory().unwrap();
        let outbox = OutboxNotifier::new(&store);
        outbox
            .send("alice@example.com", &event(NotificationKind::Recalled))
            .unwrap();
        let entries = store.list_notifications(None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].recipient, "alice@example.com");
        assert_eq!(entries[0].kind, NotificationKind::Recalled);
    }

    #[test]
    fn log_notifier_never_fails() {
        LogNotifier.send("x@example.com", &event(NotificationKind::Approved)).unwrap();
    }
}
