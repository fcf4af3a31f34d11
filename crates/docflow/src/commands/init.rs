//! `docflow init` -- initialize a docflow workspace in the current directory.

use std::env;
use std::fs;

use anyhow::{Context, Result, bail};

use docflow_config::{DocflowConfig, database_path, ensure_docflow_dir, save_config};
use docflow_storage::{SqliteStore, Storage};

use crate::cli::InitArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

const GITIGNORE_CONTENT: &str = r#"# docflow database files
*.db
*.db-journal
*.db-wal
*.db-shm

# Batch lock
remind.lock
"#;

pub fn run(ctx: &RuntimeContext, args: &InitArgs) -> Result<()> {
    let cwd = env::current_dir().context("failed to get current directory")?;
    let docflow_dir = ensure_docflow_dir(&cwd)
        .with_context(|| format!("failed to create .docflow in {}", cwd.display()))?;
    let db_path = ctx.db_path.clone().unwrap_or_else(|| database_path(&docflow_dir));

    if !args.force && db_path.exists() {
        bail!(
            "found existing database at {}\n\n\
            This workspace is already initialized. Use --force to re-initialize.",
            db_path.display()
        );
    }

    let gitignore_path = docflow_dir.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(&gitignore_path, GITIGNORE_CONTENT).with_context(|| {
            format!("failed to create .gitignore: {}", gitignore_path.display())
        })?;
    }

    // Keep an existing file's settings; only the prefix is taken from flags.
    let config_path = docflow_dir.join("config.yaml");
    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        serde_yaml::from_str::<Option<DocflowConfig>>(&content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?
            .unwrap_or_default()
    } else {
        DocflowConfig::default()
    };
    if let Some(prefix) = &args.prefix {
        let prefix = prefix.trim().trim_end_matches('-');
        if prefix.is_empty() {
            bail!("prefix must not be empty");
        }
        config.id_prefix = prefix.to_string();
    }
    config.validate().context("invalid configuration")?;
    save_config(&docflow_dir, &config).context("failed to write config.yaml")?;

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("failed to create database: {}", db_path.display()))?;
    let actor = ctx.actor_flag.clone().unwrap_or_else(|| "unknown".to_string());
    store.set_metadata("initialized_at", &chrono::Utc::now().to_rfc3339())?;
    store.set_metadata("initialized_by", &actor)?;

    if ctx.json {
        output_json(&serde_json::json!({
            "docflow_dir": docflow_dir.display().to_string(),
            "database": db_path.display().to_string(),
            "id_prefix": config.id_prefix,
        }));
    } else if !ctx.quiet {
        println!();
        println!("docflow initialized successfully!");
        println!();
        println!("  Database: {}", db_path.display());
        println!("  Document prefix: {}", config.id_prefix);
        println!(
            "  Documents will be named: {}-<hash> (e.g., {}-a3f2dd)",
            config.id_prefix, config.id_prefix
        );
        println!();
        println!("Run `docflow user add <id> --name <name>` to get started.");
        println!();
    }

    Ok(())
}
