//! `docflow config` -- inspect the effective configuration.

use anyhow::{Context, Result};

use docflow_storage::Storage;

use crate::cli::{ConfigArgs, ConfigCommands};
use crate::context::RuntimeContext;
use crate::output::{output_json, output_table};

pub fn run(ctx: &RuntimeContext, args: &ConfigArgs) -> Result<()> {
    match &args.command {
        ConfigCommands::Show => run_show(ctx),
        ConfigCommands::Path => run_path(ctx),
        ConfigCommands::Db => run_db(ctx),
    }
}

fn run_show(ctx: &RuntimeContext) -> Result<()> {
    let dir = RuntimeContext::find_docflow_dir();
    let config = RuntimeContext::load_config(dir.as_deref())?;

    if ctx.json {
        output_json(&config);
    } else {
        let yaml = serde_yaml::to_string(&config).context("failed to serialize configuration")?;
        print!("{yaml}");
    }
    Ok(())
}

fn run_path(ctx: &RuntimeContext) -> Result<()> {
    let dir = RuntimeContext::find_docflow_dir()
        .context("no .docflow directory found. Run 'docflow init' to create one.")?;
    let path = dir.join("config.yaml");

    if ctx.json {
        output_json(&serde_json::json!({
            "path": path.display().to_string(),
            "exists": path.exists(),
        }));
    } else {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_db(ctx: &RuntimeContext) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let metadata = ws.store.get_metadata()?;

    if ctx.json {
        output_json(&metadata);
        return Ok(());
    }
    let rows: Vec<Vec<String>> = metadata.into_iter().map(|(k, v)| vec![k, v]).collect();
    output_table(&["KEY", "VALUE"], &rows);
    Ok(())
}
