//! Runtime context for command execution.
//!
//! [`RuntimeContext`] holds the global flags. Commands that touch data call
//! [`RuntimeContext::open_workspace`], which resolves the `.docflow`
//! directory, loads the layered configuration and opens the database.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use docflow_approval::{ApprovalEngine, LogNotifier, Notifier, OutboxNotifier, WebhookNotifier};
use docflow_config::{ConfigError, DocflowConfig, NotifyBackend, database_path, find_docflow_dir, load_config};
use docflow_storage::SqliteStore;

use crate::cli::GlobalArgs;

/// Runtime context passed to every command handler.
///
/// Constructed once in `main` after CLI parsing, before command dispatch.
#[derive(Debug)]
pub struct RuntimeContext {
    /// Explicit database path from `--db`.
    pub db_path: Option<PathBuf>,

    /// Actor from `--actor` / `DOCFLOW_ACTOR`, before config fallback.
    pub actor_flag: Option<String>,

    /// Whether to produce JSON output.
    pub json: bool,

    /// Verbose output.
    pub verbose: bool,

    /// Quiet mode: suppress non-essential output.
    pub quiet: bool,
}

/// An opened `.docflow` workspace.
pub struct Workspace {
    /// The `.docflow` directory, when one was found.
    pub dir: Option<PathBuf>,
    pub config: DocflowConfig,
    pub store: SqliteStore,
    /// The acting user id.
    pub actor: String,
}

impl RuntimeContext {
    pub fn from_global_args(global: &GlobalArgs) -> Self {
        Self {
            db_path: global.db.clone(),
            actor_flag: global.actor.clone().filter(|a| !a.trim().is_empty()),
            json: global.json,
            verbose: global.verbose,
            quiet: global.quiet,
        }
    }

    /// The `.docflow` directory above the working directory, if any.
    pub fn find_docflow_dir() -> Option<PathBuf> {
        let cwd = env::current_dir().ok()?;
        find_docflow_dir(&cwd)
    }

    /// Effective configuration for `dir` (defaults when there is none).
    pub fn load_config(dir: Option<&Path>) -> Result<DocflowConfig> {
        load_config(dir).context("failed to load configuration")
    }

    /// Resolves the database and opens it.
    ///
    /// Database priority: `--db` > config `db` (or `DOCFLOW_DB`) >
    /// `.docflow/docflow.db`.
    pub fn open_workspace(&self) -> Result<Workspace> {
        let dir = Self::find_docflow_dir();
        let config = Self::load_config(dir.as_deref())?;

        let db_path = match (&self.db_path, &config.db, &dir) {
            (Some(p), _, _) => p.clone(),
            (None, Some(p), _) => PathBuf::from(p),
            (None, None, Some(d)) => database_path(d),
            (None, None, None) => return Err(ConfigError::DocflowDirNotFound.into()),
        };
        if !db_path.exists() {
            anyhow::bail!(
                "no docflow database found at {}\nHint: run 'docflow init' to create a database",
                db_path.display()
            );
        }
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("failed to open database: {}", db_path.display()))?;

        let actor = resolve_actor(self.actor_flag.as_deref(), config.actor.as_deref());
        debug!(db = %db_path.display(), actor = %actor, "workspace opened");
        Ok(Workspace {
            dir,
            config,
            store,
            actor,
        })
    }
}

impl Workspace {
    /// Builds the notifier selected by `notify.backend`.
    pub fn notifier(&self) -> Box<dyn Notifier + '_> {
        match self.config.notify.backend {
            NotifyBackend::Log => Box::new(LogNotifier),
            NotifyBackend::Outbox => Box::new(OutboxNotifier::new(&self.store)),
            NotifyBackend::Webhook => Box::new(WebhookNotifier::new(
                self.config.notify.webhook_url.clone().unwrap_or_default(),
                Duration::from_secs(self.config.notify.timeout_secs),
            )),
        }
    }

    /// An engine over this workspace's store, configured from the config.
    pub fn engine<'a>(&'a self, notifier: &'a dyn Notifier) -> ApprovalEngine<'a> {
        ApprovalEngine::new(&self.store, notifier)
            .with_date_format(self.config.date_format.clone())
            .with_id_prefix(self.config.id_prefix.clone())
    }

    /// The `.docflow` directory, required by commands that keep files there.
    pub fn require_dir(&self) -> Result<&Path> {
        self.dir
            .as_deref()
            .ok_or_else(|| ConfigError::DocflowDirNotFound.into())
    }
}

/// Resolves the actor name.
///
/// Priority: explicit flag (or `DOCFLOW_ACTOR`) > config `actor` > `USER` /
/// `USERNAME` env > `"unknown"`.
fn resolve_actor(flag_value: Option<&str>, configured: Option<&str>) -> String {
    if let Some(actor) = flag_value.or(configured) {
        let actor = actor.trim();
        if !actor.is_empty() {
            return actor.to_string();
        }
    }

    if let Ok(user) = env::var("USER").or_else(|_| env::var("USERNAME")) {
        if !user.is_empty() {
            return user;
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_config() {
        assert_eq!(resolve_actor(Some("alice"), Some("bob")), "alice");
    }

    #[test]
    fn config_used_without_flag() {
        assert_eq!(resolve_actor(None, Some(" bob ")), "bob");
    }

    #[test]
    fn falls_back_to_environment() {
        let actor = resolve_actor(None, None);
        assert!(!actor.is_empty());
    }

    #[test]
    fn blank_flag_is_ignored() {
        let global = GlobalArgs {
            db: None,
            actor: Some("  ".into()),
            json: false,
            verbose: false,
            quiet: false,
        };
        let ctx = RuntimeContext::from_global_args(&global);
        assert!(ctx.actor_flag.is_none());
    }
}
