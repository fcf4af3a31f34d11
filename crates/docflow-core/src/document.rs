//! The Document type and its builder.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::DocumentStatus;
use crate::form_data::FormData;

/// Per-document approver assignments: step_order -> user ids.
pub type Assignments = BTreeMap<u32, Vec<String>>;

/// A document moving through a workflow version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub template_id: i64,
    pub workflow_version_id: i64,
    pub creator_id: String,
    pub status: DocumentStatus,

    /// Step order of the active step. Zero while the document is in draft.
    #[serde(default)]
    pub current_step: u32,

    /// Incremented by every submit and recall. Approver rows created in an
    /// earlier round are history and never active again.
    #[serde(default)]
    pub round: u32,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub assignments: Assignments,

    #[serde(default)]
    pub form_data: FormData,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Assignees recorded for `step_order`, if any.
    pub fn assignees(&self, step_order: u32) -> &[String] {
        self.assignments
            .get(&step_order)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl Default for Document {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: String::new(),
            template_id: 0,
            workflow_version_id: 0,
            creator_id: String::new(),
            status: DocumentStatus::Draft,
            current_step: 0,
            round: 0,
            assignments: Assignments::new(),
            form_data: FormData::new(),
            submitted_at: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Document`], mostly used by tests and `doc create`.
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        let document = Document {
            title: title.into(),
            ..Document::default()
        };
        Self { document }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.document.id = id.into();
        self
    }

    pub fn template(mut self, template_id: i64) -> Self {
        self.document.template_id = template_id;
        self
    }

    pub fn workflow_version(mut self, version_id: i64) -> Self {
        self.document.workflow_version_id = version_id;
        self
    }

    pub fn creator(mut self, creator_id: impl Into<String>) -> Self {
        self.document.creator_id = creator_id.into();
        self
    }

    pub fn status(mut self, status: DocumentStatus) -> Self {
        self.document.status = status;
        self
    }

    pub fn form_data(mut self, form_data: FormData) -> Self {
        self.document.form_data = form_data;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.document.created_at = at;
        self.document.updated_at = at;
        self
    }

    pub fn build(self) -> Document {
        self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_defaults_to_draft() {
        let doc = DocumentBuilder::new("Purchase order")
            .id("doc-abc123")
            .template(1)
            .workflow_version(2)
            .creator("alice")
            .build();
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert_eq!(doc.current_step, 0);
        assert!(doc.submitted_at.is_none());
    }

    #[test]
    fn assignees_for_missing_step_is_empty() {
        let mut doc = DocumentBuilder::new("x").build();
        doc.assignments.insert(1, vec!["bob".into()]);
        assert_eq!(doc.assignees(1), ["bob".to_string()]);
        assert!(doc.assignees(2).is_empty());
    }

    #[test]
    fn json_skips_empty_optionals() {
        let doc = DocumentBuilder::new("x").id("doc-1").build();
        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("submitted_at").is_none());
        assert!(value.get("assignments").is_none());
        assert_eq!(value["status"], "draft");
    }
}
