//! Command handlers, one module per top-level subcommand.

pub mod completion;
pub mod config_cmd;
pub mod doc;
pub mod init;
pub mod notifications;
pub mod remind;
pub mod template;
pub mod user;
pub mod version;
pub mod workflow;
