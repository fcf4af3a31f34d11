//! Calculation script interpreter for docflow templates.
//!
//! Scripts are short statement lists that read and write cells of a
//! document's form grid:
//!
//! ```text
//! // line comments are allowed
//! total = getValue("Main:A1") + getValue("Main:A2");
//! setValue("Main:A3", total);
//! setValue("Main:A4", parseFloat(getValue("Main:B1")) || 1);
//! ```
//!
//! The pipeline is [`lexer`] -> [`parser`] -> [`engine`]. Nothing is ever
//! handed to a host execution facility; the interpreter only knows the
//! grammar documented in [`parser`] and three built-ins (`getValue`,
//! `setValue`, `parseFloat`).

pub mod engine;
pub mod lexer;
pub mod parser;
pub mod types;

pub use engine::execute;
pub use parser::parse_script;
pub use types::{FormulaError, Script, Value};
