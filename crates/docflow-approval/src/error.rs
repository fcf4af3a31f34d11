//! Workflow error types.

use docflow_core::enums::{DocumentStatus, StepType};
use docflow_core::validation::ValidationError;
use docflow_formula::FormulaError;
use docflow_storage::StorageError;

/// Why a workflow action was refused or failed.
///
/// Each invariant a transition checks has its own variant so callers can
/// report the exact reason.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{actor} is not an active approver on step {step_order} of {document_id}")]
    NotActiveApprover {
        document_id: String,
        actor: String,
        step_order: u32,
    },

    #[error("cannot {action} document {document_id} while it is {status}")]
    InvalidState {
        document_id: String,
        status: DocumentStatus,
        action: &'static str,
    },

    #[error("recall not permitted after {step_type} step completed")]
    RecallNotPermitted { step_type: StepType },

    #[error("only the creator ({creator}) may {action} document {document_id}")]
    NotCreator {
        document_id: String,
        creator: String,
        action: &'static str,
    },

    #[error("template {template} is not accepting documents ({reason})")]
    TemplateUnavailable { template: String, reason: String },

    #[error("workflow configuration error: step {step_order} has no approvers")]
    MissingStepApprovers { step_order: u32 },

    #[error("workflow configuration error: step {step_order} is not defined")]
    MissingStep { step_order: u32 },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

impl WorkflowError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_not_found())
    }

    /// True for errors caused by a broken workflow definition rather than
    /// by the action itself.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingStepApprovers { .. } | Self::MissingStep { .. }
        )
    }
}
