//! Document activity log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ActivityAction, DocumentStatus};

/// An audit record of something that happened to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    #[serde(default)]
    pub id: i64,
    pub document_id: String,
    pub action: ActivityAction,
    pub actor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_status: Option<DocumentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<DocumentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_order: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(
        document_id: impl Into<String>,
        action: ActivityAction,
        actor: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            document_id: document_id.into(),
            action,
            actor: actor.into(),
            old_status: None,
            new_status: None,
            step_order: None,
            comment: None,
            created_at,
        }
    }

    pub fn transition(mut self, old: DocumentStatus, new: DocumentStatus) -> Self {
        self.old_status = Some(old);
        self.new_status = Some(new);
        self
    }

    pub fn step(mut self, step_order: u32) -> Self {
        self.step_order = Some(step_order);
        self
    }

    pub fn comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }
}
