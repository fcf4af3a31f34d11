//! `docflow workflow` -- import, inspect and publish workflow versions.

use anyhow::{Context, Result};
use chrono::Utc;

use docflow_core::workflow::WorkflowVersion;
use docflow_storage::Storage;
use docflow_template::definition::load_workflow_definition;

use crate::cli::{WorkflowArgs, WorkflowCommands, WorkflowIdArgs, WorkflowImportArgs, WorkflowListArgs};
use crate::context::RuntimeContext;
use crate::output::{format_time, output_json, output_table};

pub fn run(ctx: &RuntimeContext, args: &WorkflowArgs) -> Result<()> {
    match &args.command {
        WorkflowCommands::Import(a) => run_import(ctx, a),
        WorkflowCommands::List(a) => run_list(ctx, a),
        WorkflowCommands::Show(a) => run_show(ctx, a),
        WorkflowCommands::Publish(a) => run_publish(ctx, a),
    }
}

fn run_import(ctx: &RuntimeContext, args: &WorkflowImportArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let (name, steps) = load_workflow_definition(&args.file)
        .with_context(|| format!("failed to load workflow from {}", args.file.display()))?;
    ws.store
        .get_template(args.template)
        .with_context(|| format!("template {} not found", args.template))?;
    let version = ws
        .store
        .create_workflow_version(&name, args.template, &steps, Utc::now())?;

    if ctx.json {
        output_json(&version);
    } else if !ctx.quiet {
        println!(
            "Created workflow {} (id {}, {}, {} step(s))",
            version.label(),
            version.id,
            version.status,
            version.steps.len()
        );
    }
    Ok(())
}

fn run_list(ctx: &RuntimeContext, args: &WorkflowListArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let versions = ws.store.list_workflow_versions(args.template)?;

    if ctx.json {
        output_json(&versions);
        return Ok(());
    }
    if versions.is_empty() {
        println!("No workflow versions.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = versions
        .iter()
        .map(|v| {
            vec![
                v.id.to_string(),
                v.name.clone(),
                v.version.to_string(),
                v.template_id.to_string(),
                v.status.to_string(),
                v.steps.len().to_string(),
            ]
        })
        .collect();
    output_table(&["ID", "NAME", "VERSION", "TEMPLATE", "STATUS", "STEPS"], &rows);
    Ok(())
}

fn run_show(ctx: &RuntimeContext, args: &WorkflowIdArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let version = ws.store.get_workflow_version(args.id)?;

    if ctx.json {
        output_json(&version);
        return Ok(());
    }
    print_version(&version);
    Ok(())
}

fn run_publish(ctx: &RuntimeContext, args: &WorkflowIdArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let version = ws
        .store
        .publish_workflow_version(args.id)
        .with_context(|| format!("failed to publish workflow version {}", args.id))?;

    if ctx.json {
        output_json(&version);
    } else if !ctx.quiet {
        println!("Published workflow {} (id {})", version.label(), version.id);
    }
    Ok(())
}

fn print_version(version: &WorkflowVersion) {
    println!(
        "{} (id {}, template {}, {})",
        version.label(),
        version.id,
        version.template_id,
        version.status
    );
    println!("Created: {}", format_time(&version.created_at));
    println!();
    let rows: Vec<Vec<String>> = version
        .steps
        .iter()
        .map(|s| {
            vec![
                s.step_order.to_string(),
                s.step_type.label().to_string(),
                s.approvers.join(","),
                s.signature_cell.as_ref().map(|c| c.to_string()).unwrap_or_default(),
                s.approved_date_cell.as_ref().map(|c| c.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    output_table(&["STEP", "TYPE", "APPROVERS", "SIGNATURE", "DATE CELL"], &rows);
}
