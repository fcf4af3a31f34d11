//! Terminal styling for docflow CLI output.

pub mod styles;
pub mod terminal;
