//! Template and workflow definition files.
//!
//! Both kinds are accepted as TOML or JSON; the format is chosen by file
//! extension, falling back to trying JSON then TOML.
//!
//! ```toml
//! name = "Purchase request"
//! calculation_script = 'setValue("Main:A3", getValue("Main:A1") + getValue("Main:A2"))'
//!
//! [[sheets]]
//! name = "Main"
//! html_file = "main.html"
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use docflow_core::enums::StepType;
use docflow_core::form_data::CellRef;
use docflow_core::template::{Sheet, Template};
use docflow_core::validation::{validate_steps, validate_template};
use docflow_core::workflow::WorkflowStep;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::TemplateError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Path to the sheet HTML, relative to the definition file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub name: String,
    pub sheets: Vec<SheetDefinition>,
    #[serde(default)]
    pub calculation_script: String,
}

impl TemplateDefinition {
    /// Builds a validated template. Sheet HTML given by file is read
    /// relative to `base_dir`, and the calculation script must parse.
    pub fn into_template(
        self,
        base_dir: &Path,
        now: DateTime<Utc>,
    ) -> Result<Template, TemplateError> {
        if self.name.trim().is_empty() {
            return Err(TemplateError::Parse("template name is required".into()));
        }
        let mut sheets = Vec::with_capacity(self.sheets.len());
        for sheet in self.sheets {
            let html = match (sheet.html, sheet.html_file) {
                (Some(html), None) => html,
                (None, Some(file)) => std::fs::read_to_string(base_dir.join(file))?,
                (None, None) => String::new(),
                (Some(_), Some(_)) => {
                    return Err(TemplateError::Parse(format!(
                        "sheet '{}' sets both html and html_file",
                        sheet.name
                    )));
                }
            };
            sheets.push(Sheet::new(sheet.name, html));
        }

        let template =
            Template::new(self.name, sheets, now).with_calculation_script(self.calculation_script);
        validate_template(&template)?;
        if !template.calculation_script.trim().is_empty() {
            docflow_formula::parse_script(&template.calculation_script)?;
        }
        Ok(template)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Defaults to the step's position in the list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_order: Option<u32>,
    #[serde(rename = "type", alias = "step_type")]
    pub step_type: StepType,
    #[serde(default)]
    pub approvers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature_cell: Option<CellRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_date_cell: Option<CellRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub steps: Vec<StepDefinition>,
}

impl WorkflowDefinition {
    /// Numbers the steps and checks them.
    pub fn into_steps(self) -> Result<(String, Vec<WorkflowStep>), TemplateError> {
        if self.name.trim().is_empty() {
            return Err(TemplateError::Parse("workflow name is required".into()));
        }
        let mut steps: Vec<WorkflowStep> = self
            .steps
            .into_iter()
            .enumerate()
            .map(|(i, def)| WorkflowStep {
                step_order: def.step_order.unwrap_or(i as u32 + 1),
                step_type: def.step_type,
                approvers: def.approvers,
                signature_cell: def.signature_cell,
                approved_date_cell: def.approved_date_cell,
            })
            .collect();
        steps.sort_by_key(|s| s.step_order);
        validate_steps(&steps)?;
        Ok((self.name, steps))
    }
}

fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T, TemplateError> {
    toml::from_str(content).map_err(|e| TemplateError::Parse(e.to_string()))
}

fn parse_json<T: DeserializeOwned>(content: &str) -> Result<T, TemplateError> {
    serde_json::from_str(content).map_err(|e| TemplateError::Parse(e.to_string()))
}

fn load<T: DeserializeOwned>(path: &Path) -> Result<T, TemplateError> {
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => parse_toml(&content),
        Some("json") => parse_json(&content),
        _ => parse_json(&content).or_else(|_| parse_toml(&content)),
    }
}

/// Loads and validates a template definition file.
pub fn load_template_definition(path: &Path, now: DateTime<Utc>) -> Result<Template, TemplateError> {
    let definition: TemplateDefinition = load(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    definition.into_template(base_dir, now)
}

/// Loads a workflow definition file into its name and numbered steps.
pub fn load_workflow_definition(path: &Path) -> Result<(String, Vec<WorkflowStep>), TemplateError> {
    let definition: WorkflowDefinition = load(path)?;
    definition.into_steps()
}
