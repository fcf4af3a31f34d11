//! SQLite-backed storage implementation.

mod activity;
mod approvers;
mod documents;
mod metadata;
mod notifications;
pub mod schema;
mod store;
mod templates;
mod transaction;
mod users;
mod workflows;

pub use store::SqliteStore;
