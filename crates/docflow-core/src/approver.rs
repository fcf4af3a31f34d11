//! Approver assignments: one row per (document, round, step, approver).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ApprovalStatus, StepType};

/// One person's sign-off obligation on one step of one document.
///
/// Rows are append-only. Only the approver's own action and the overdue
/// detector's stamp mutate them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentApprover {
    /// Row id assigned by storage (0 before insert).
    #[serde(default)]
    pub id: i64,
    pub document_id: String,
    pub round: u32,
    pub step_order: u32,
    pub step_type: StepType,
    pub approver_id: String,
    pub status: ApprovalStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overdue_notified_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
}

impl DocumentApprover {
    /// A fresh pending assignment.
    pub fn pending(
        document_id: impl Into<String>,
        round: u32,
        step_order: u32,
        step_type: StepType,
        approver_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            document_id: document_id.into(),
            round,
            step_order,
            step_type,
            approver_id: approver_id.into(),
            status: ApprovalStatus::Pending,
            approved_at: None,
            rejected_at: None,
            comment: None,
            overdue_notified_at: None,
            created_at,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}

/// Typed partial update for an approver row. Only `Some` fields apply.
#[derive(Debug, Clone, Default)]
pub struct ApproverUpdates {
    pub status: Option<ApprovalStatus>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_row_has_no_timestamps() {
        let row = DocumentApprover::pending("doc-1", 1, 2, StepType::Checking, "carol", Utc::now());
        assert!(row.is_pending());
        assert_eq!(row.id, 0);
        assert!(row.approved_at.is_none());
        assert!(row.overdue_notified_at.is_none());
    }
}
