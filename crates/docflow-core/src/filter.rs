//! Filter types for querying documents and approver rows.

use crate::enums::{ApprovalStatus, DocumentStatus};

/// Filter for document listings.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub status: Option<DocumentStatus>,
    pub creator_id: Option<String>,
    pub template_id: Option<i64>,
    pub limit: Option<i64>,
}

/// Filter for approver row lookups. `None` fields match anything.
#[derive(Debug, Clone, Default)]
pub struct ApproverFilter {
    pub document_id: Option<String>,
    pub round: Option<u32>,
    pub step_order: Option<u32>,
    pub approver_id: Option<String>,
    pub status: Option<ApprovalStatus>,
}

impl ApproverFilter {
    /// Rows belonging to one document.
    pub fn for_document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            ..Self::default()
        }
    }

    /// Rows of a specific step in a specific round.
    pub fn for_step(document_id: impl Into<String>, round: u32, step_order: u32) -> Self {
        Self {
            document_id: Some(document_id.into()),
            round: Some(round),
            step_order: Some(step_order),
            ..Self::default()
        }
    }

    pub fn approver(mut self, approver_id: impl Into<String>) -> Self {
        self.approver_id = Some(approver_id.into());
        self
    }

    pub fn status(mut self, status: ApprovalStatus) -> Self {
        self.status = Some(status);
        self
    }
}
