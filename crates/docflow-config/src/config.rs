//! Configuration types and loading.
//!
//! [`DocflowConfig`] mirrors `.docflow/config.yaml`. [`load_config`] layers
//! serde defaults, the YAML file and `DOCFLOW_*` environment variables (in
//! that order, later layers winning). Nested keys use `__` in variable
//! names, e.g. `DOCFLOW_OVERDUE__THRESHOLD_DAYS=5`.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A layer could not be merged or extracted.
    #[error("invalid configuration: {0}")]
    Extract(Box<figment::Error>),

    #[error("no .docflow directory found (run 'docflow init' first)")]
    DocflowDirNotFound,

    #[error("invalid configuration value for key '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Extract(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Where notifications go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotifyBackend {
    /// Tracing events only.
    Log,
    /// The database's notifications table.
    #[default]
    Outbox,
    /// HTTP POST to `notify.webhook_url`.
    Webhook,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub backend: NotifyBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            backend: NotifyBackend::default(),
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdueConfig {
    /// Days an assignment may wait before its approver is reminded.
    #[serde(default = "default_threshold_days")]
    pub threshold_days: i64,
}

impl Default for OverdueConfig {
    fn default() -> Self {
        Self {
            threshold_days: default_threshold_days(),
        }
    }
}

fn default_threshold_days() -> i64 {
    3
}

// ---------------------------------------------------------------------------
// Main config struct
// ---------------------------------------------------------------------------

/// The full docflow configuration.
///
/// Every field has a serde default, so a partial file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocflowConfig {
    /// Prefix for generated document ids.
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Acting user id for CLI commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// Database path override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,

    /// strftime format written into approved-date cells.
    #[serde(default = "default_date_format")]
    pub date_format: String,

    #[serde(default)]
    pub overdue: OverdueConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

impl Default for DocflowConfig {
    fn default() -> Self {
        Self {
            id_prefix: default_id_prefix(),
            actor: None,
            db: None,
            date_format: default_date_format(),
            overdue: OverdueConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

fn default_id_prefix() -> String {
    "doc".to_string()
}

fn default_date_format() -> String {
    "%d/%m/%Y".to_string()
}

impl DocflowConfig {
    /// Checks values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.id_prefix.trim().is_empty() {
            return Err(invalid("id_prefix", "must not be empty"));
        }
        if self.overdue.threshold_days < 0 {
            return Err(invalid("overdue.threshold_days", "must not be negative"));
        }
        if self.notify.backend == NotifyBackend::Webhook
            && self.notify.webhook_url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            return Err(invalid(
                "notify.webhook_url",
                "required when notify.backend is webhook",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

const ENV_PREFIX: &str = "DOCFLOW_";

/// The layered provider stack for `docflow_dir` (which may not exist).
pub fn figment(docflow_dir: Option<&Path>) -> Figment {
    figment_with_env(docflow_dir, ENV_PREFIX)
}

fn figment_with_env(docflow_dir: Option<&Path>, prefix: &str) -> Figment {
    let mut figment = Figment::from(Serialized::defaults(DocflowConfig::default()));
    if let Some(dir) = docflow_dir {
        figment = figment.merge(Yaml::file(dir.join("config.yaml")));
    }
    figment.merge(Env::prefixed(prefix).split("__"))
}

/// Loads and validates the effective configuration.
///
/// A missing or empty `config.yaml` contributes nothing.
pub fn load_config(docflow_dir: Option<&Path>) -> Result<DocflowConfig> {
    let config: DocflowConfig = figment(docflow_dir).extract()?;
    config.validate()?;
    Ok(config)
}

/// Writes `config` to `config.yaml` inside `docflow_dir`.
pub fn save_config(docflow_dir: &Path, config: &DocflowConfig) -> Result<()> {
    std::fs::create_dir_all(docflow_dir)?;
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(docflow_dir.join("config.yaml"), yaml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let cfg = DocflowConfig::default();
        assert_eq!(cfg.id_prefix, "doc");
        assert_eq!(cfg.overdue.threshold_days, 3);
        assert_eq!(cfg.notify.backend, NotifyBackend::Outbox);
        assert_eq!(cfg.notify.timeout_secs, 10);
        assert_eq!(cfg.date_format, "%d/%m/%Y");
        cfg.validate().unwrap();
    }

    #[test]
    fn missing_dir_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg: DocflowConfig = figment_with_env(Some(dir.path()), "DOCFLOW_TEST_MISSING_")
            .extract()
            .unwrap();
        assert_eq!(cfg, DocflowConfig::default());
    }

    #[test]
    fn roundtrip_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = DocflowConfig::default();
        cfg.id_prefix = "po".into();
        cfg.overdue.threshold_days = 5;
        save_config(dir.path(), &cfg).unwrap();

        let loaded: DocflowConfig = figment_with_env(Some(dir.path()), "DOCFLOW_TEST_ROUNDTRIP_")
            .extract()
            .unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.yaml"),
            "notify:\n  backend: log\n",
        )
        .unwrap();
        let cfg: DocflowConfig = figment_with_env(Some(dir.path()), "DOCFLOW_TEST_PARTIAL_")
            .extract()
            .unwrap();
        assert_eq!(cfg.notify.backend, NotifyBackend::Log);
        assert_eq!(cfg.notify.timeout_secs, 10);
        assert_eq!(cfg.id_prefix, "doc");
    }

    #[test]
    fn env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "id_prefix: file\n").unwrap();
        // SAFETY: the prefix is unique to this test.
        unsafe {
            std::env::set_var("DOCFLOW_TEST_ENV_ID_PREFIX", "env");
            std::env::set_var("DOCFLOW_TEST_ENV_OVERDUE__THRESHOLD_DAYS", "7");
        }
        let cfg: DocflowConfig = figment_with_env(Some(dir.path()), "DOCFLOW_TEST_ENV_")
            .extract()
            .unwrap();
        assert_eq!(cfg.id_prefix, "env");
        assert_eq!(cfg.overdue.threshold_days, 7);
    }

    #[test]
    fn webhook_requires_url() {
        let mut cfg = DocflowConfig::default();
        cfg.notify.backend = NotifyBackend::Webhook;
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "notify.webhook_url"));

        cfg.notify.webhook_url = Some("http://localhost:9/hook".into());
        cfg.validate().unwrap();
    }
}
