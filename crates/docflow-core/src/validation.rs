//! Validation rules for documents, templates and workflow definitions.

use std::collections::HashSet;

use crate::document::Document;
use crate::template::Template;
use crate::workflow::WorkflowStep;

/// Error type for validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("title is required")]
    TitleRequired,

    #[error("title must be 500 characters or less (got {0})")]
    TitleTooLong(usize),

    #[error("creator is required")]
    CreatorRequired,

    #[error("template must have at least one sheet")]
    NoSheets,

    #[error("invalid sheet name '{0}' (must be non-empty and contain no ':')")]
    InvalidSheetName(String),

    #[error("duplicate sheet name '{0}'")]
    DuplicateSheet(String),

    #[error("workflow must have at least one step")]
    NoSteps,

    #[error("step orders must be contiguous from 1 (expected {expected}, got {got})")]
    StepOrderGap { expected: u32, got: u32 },

    #[error("duplicate approver '{approver}' on step {step_order}")]
    DuplicateApprover { step_order: u32, approver: String },
}

/// Validates a document before it is stored.
pub fn validate_document(doc: &Document) -> Result<(), ValidationError> {
    if doc.title.trim().is_empty() {
        return Err(ValidationError::TitleRequired);
    }
    let len = doc.title.chars().count();
    if len > 500 {
        return Err(ValidationError::TitleTooLong(len));
    }
    if doc.creator_id.is_empty() {
        return Err(ValidationError::CreatorRequired);
    }
    Ok(())
}

/// Validates a template's sheet list.
pub fn validate_template(template: &Template) -> Result<(), ValidationError> {
    if template.sheets.is_empty() {
        return Err(ValidationError::NoSheets);
    }
    let mut seen = HashSet::new();
    for sheet in &template.sheets {
        if sheet.name.trim().is_empty() || sheet.name.contains(':') {
            return Err(ValidationError::InvalidSheetName(sheet.name.clone()));
        }
        if !seen.insert(sheet.name.as_str()) {
            return Err(ValidationError::DuplicateSheet(sheet.name.clone()));
        }
    }
    Ok(())
}

/// Validates step definitions: non-empty, orders 1..=n ascending with no
/// gaps or repeats, and no approver listed twice on one step.
pub fn validate_steps(steps: &[WorkflowStep]) -> Result<(), ValidationError> {
    if steps.is_empty() {
        return Err(ValidationError::NoSteps);
    }
    for (i, step) in steps.iter().enumerate() {
        let expected = i as u32 + 1;
        if step.step_order != expected {
            return Err(ValidationError::StepOrderGap {
                expected,
                got: step.step_order,
            });
        }
        let mut seen = HashSet::new();
        for approver in &step.approvers {
            if !seen.insert(approver.as_str()) {
                return Err(ValidationError::DuplicateApprover {
                    step_order: step.step_order,
                    approver: approver.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentBuilder;
    use crate::enums::StepType;
    use crate::template::Sheet;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    #[test]
    fn document_requires_title_and_creator() {
        let doc = DocumentBuilder::new("  ").creator("alice").build();
        assert_eq!(validate_document(&doc), Err(ValidationError::TitleRequired));

        let doc = DocumentBuilder::new("ok").build();
        assert_eq!(validate_document(&doc), Err(ValidationError::CreatorRequired));

        let doc = DocumentBuilder::new("x".repeat(501)).creator("alice").build();
        assert_eq!(validate_document(&doc), Err(ValidationError::TitleTooLong(501)));

        let doc = DocumentBuilder::new("ok").creator("alice").build();
        assert!(validate_document(&doc).is_ok());
    }

    #[test]
    fn template_sheet_names() {
        let mut t = Template::new("t", vec![], Utc::now());
        assert_eq!(validate_template(&t), Err(ValidationError::NoSheets));

        t.sheets = vec![Sheet::new("Main", ""), Sheet::new("Main", "")];
        assert_eq!(
            validate_template(&t),
            Err(ValidationError::DuplicateSheet("Main".into()))
        );

        t.sheets = vec![Sheet::new("A:B", "")];
        assert_eq!(
            validate_template(&t),
            Err(ValidationError::InvalidSheetName("A:B".into()))
        );
    }

    #[test]
    fn steps_must_be_contiguous() {
        assert_eq!(validate_steps(&[]), Err(ValidationError::NoSteps));

        let steps = vec![
            WorkflowStep::new(1, StepType::Prepare),
            WorkflowStep::new(3, StepType::Approve),
        ];
        assert_eq!(
            validate_steps(&steps),
            Err(ValidationError::StepOrderGap { expected: 2, got: 3 })
        );

        let steps = vec![
            WorkflowStep::new(1, StepType::Checking),
            WorkflowStep::new(2, StepType::Approve),
        ];
        assert!(validate_steps(&steps).is_ok());
    }

    #[test]
    fn duplicate_approver_on_step() {
        let steps = vec![WorkflowStep::new(1, StepType::Approve).with_approvers(["bob", "bob"])];
        assert_eq!(
            validate_steps(&steps),
            Err(ValidationError::DuplicateApprover {
                step_order: 1,
                approver: "bob".into()
            })
        );
    }
}
