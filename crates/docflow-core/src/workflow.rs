//! Workflow versions and their ordered step definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{StepType, VersionStatus};
use crate::form_data::CellRef;

/// One ordered stage of a workflow version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step_order: u32,
    pub step_type: StepType,

    /// Default assignees (user ids) when a document does not override them.
    #[serde(default)]
    pub approvers: Vec<String>,

    /// Cell receiving the approver's signature record on approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_cell: Option<CellRef>,

    /// Cell receiving the approval date on approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_date_cell: Option<CellRef>,
}

impl WorkflowStep {
    pub fn new(step_order: u32, step_type: StepType) -> Self {
        Self {
            step_order,
            step_type,
            approvers: Vec::new(),
            signature_cell: None,
            approved_date_cell: None,
        }
    }

    pub fn with_approvers<I, S>(mut self, approvers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.approvers = approvers.into_iter().map(Into::into).collect();
        self
    }
}

/// A versioned, publishable step list bound to one template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowVersion {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub version: u32,
    pub template_id: i64,
    #[serde(default)]
    pub status: VersionStatus,
    pub steps: Vec<WorkflowStep>,
    pub created_at: DateTime<Utc>,
}

impl WorkflowVersion {
    /// Looks up a step by its order.
    pub fn step(&self, step_order: u32) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.step_order == step_order)
    }

    pub fn first_step(&self) -> Option<&WorkflowStep> {
        self.step(1)
    }

    /// The step after `step_order`, or `None` when it is the last one.
    pub fn next_step(&self, step_order: u32) -> Option<&WorkflowStep> {
        self.step(step_order + 1)
    }

    /// Publication requires a draft with at least one step.
    pub fn can_publish(&self) -> bool {
        self.status == VersionStatus::Draft && !self.steps.is_empty()
    }

    /// Human label, e.g. `purchase-order v2`.
    pub fn label(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }
}
