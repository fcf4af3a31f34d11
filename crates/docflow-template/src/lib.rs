//! Template handling for docflow.
//!
//! - [`fields`]: extracts typed field markers such as `[text* name cell="A1"]`
//!   from sheet HTML.
//! - [`render`]: resolves those markers into form inputs filled from a
//!   document's form data.
//! - [`definition`]: loads template and workflow definitions from TOML or
//!   JSON files.

pub mod definition;
pub mod fields;
pub mod render;

pub use fields::{Field, FieldCatalog, parse_all_sheets};
pub use render::{RenderedSheet, render_sheets};

/// Errors from loading or validating template definitions.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid definition: {0}")]
    Validation(#[from] docflow_core::validation::ValidationError),

    #[error("calculation script does not parse: {0}")]
    Script(#[from] docflow_formula::FormulaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
