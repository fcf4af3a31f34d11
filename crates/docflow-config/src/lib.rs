//! Configuration management for docflow.
//!
//! Handles discovery of the `.docflow/` directory and layered loading of
//! `.docflow/config.yaml` together with `DOCFLOW_*` environment overrides.

pub mod config;
pub mod docflow_dir;

pub use config::{ConfigError, DocflowConfig, NotifyBackend, load_config, save_config};
pub use docflow_dir::{DATABASE_FILE, database_path, ensure_docflow_dir, find_docflow_dir};
