//! Core domain types for docflow.
//!
//! Documents, their approver assignments, workflow step definitions,
//! templates and the sheet/cell form grid shared by every other crate.

pub mod activity;
pub mod approver;
pub mod document;
pub mod enums;
pub mod filter;
pub mod form_data;
pub mod idgen;
pub mod template;
pub mod user;
pub mod validation;
pub mod workflow;
