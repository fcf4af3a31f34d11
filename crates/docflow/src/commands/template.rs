//! `docflow template` -- import, inspect, render and publish form templates.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};

use docflow_storage::Storage;
use docflow_template::definition::load_template_definition;
use docflow_template::{parse_all_sheets, render_sheets};
use docflow_ui::styles::render_category;

use crate::cli::{
    TemplateArgs, TemplateCommands, TemplateExpireArgs, TemplateIdArgs, TemplateImportArgs,
    TemplateRenderArgs,
};
use crate::context::RuntimeContext;
use crate::output::{format_time, output_json, output_table};

pub fn run(ctx: &RuntimeContext, args: &TemplateArgs) -> Result<()> {
    match &args.command {
        TemplateCommands::Import(a) => run_import(ctx, a),
        TemplateCommands::List => run_list(ctx),
        TemplateCommands::Show(a) => run_show(ctx, a),
        TemplateCommands::Fields(a) => run_fields(ctx, a),
        TemplateCommands::Render(a) => run_render(ctx, a),
        TemplateCommands::Publish(a) => run_publish(ctx, a),
        TemplateCommands::Expire(a) => run_expire(ctx, a),
    }
}

fn run_import(ctx: &RuntimeContext, args: &TemplateImportArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let definition = load_template_definition(&args.file, Utc::now())
        .with_context(|| format!("failed to load template from {}", args.file.display()))?;
    let id = ws.store.create_template(&definition)?;
    let template = ws.store.get_template(id)?;
    let fields = parse_all_sheets(&template.sheets);

    if ctx.json {
        output_json(&template);
    } else if !ctx.quiet {
        println!(
            "Imported template {}: {} ({} sheet(s), {} field(s))",
            template.id,
            template.label(),
            template.sheets.len(),
            fields.len()
        );
    }
    Ok(())
}

fn run_list(ctx: &RuntimeContext) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let templates = ws.store.list_templates()?;

    if ctx.json {
        output_json(&templates);
        return Ok(());
    }
    if templates.is_empty() {
        println!("No templates.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = templates
        .iter()
        .map(|t| {
            vec![
                t.id.to_string(),
                t.name.clone(),
                t.version.to_string(),
                t.status.to_string(),
                t.sheets.len().to_string(),
                parse_all_sheets(&t.sheets).len().to_string(),
                format_time(&t.created_at),
            ]
        })
        .collect();
    output_table(
        &["ID", "NAME", "VERSION", "STATUS", "SHEETS", "FIELDS", "CREATED"],
        &rows,
    );
    Ok(())
}

fn run_show(ctx: &RuntimeContext, args: &TemplateIdArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let template = ws.store.get_template(args.id)?;

    if ctx.json {
        output_json(&template);
        return Ok(());
    }
    println!("{} {} ({})", template.id, template.label(), template.status);
    println!("Created: {}", format_time(&template.created_at));
    if let Some(parent) = template.parent_id {
        println!("Previous version: {parent}");
    }
    if let Some(at) = &template.expired_at {
        let reason = template.expired_reason.as_deref().unwrap_or("no reason given");
        println!("Expires: {} ({reason})", format_time(at));
    }
    println!();
    println!("{}", render_category("Sheets"));
    for sheet in &template.sheets {
        println!("  {} ({} bytes)", sheet.name, sheet.html.len());
    }
    if !template.calculation_script.trim().is_empty() {
        println!();
        println!("{}", render_category("Calculation script"));
        for line in template.calculation_script.lines() {
            println!("  {line}");
        }
    }
    Ok(())
}

fn run_fields(ctx: &RuntimeContext, args: &TemplateIdArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let template = ws.store.get_template(args.id)?;
    let catalog = parse_all_sheets(&template.sheets);

    if ctx.json {
        output_json(&catalog);
        return Ok(());
    }
    if catalog.is_empty() {
        println!("No fields.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = catalog
        .iter()
        .map(|f| {
            vec![
                f.name.clone(),
                f.field_type.to_string(),
                f.cell_ref().map(|c| c.to_string()).unwrap_or_default(),
                if f.required { "yes" } else { "" }.to_string(),
            ]
        })
        .collect();
    output_table(&["NAME", "TYPE", "CELL", "REQUIRED"], &rows);
    Ok(())
}

fn run_render(ctx: &RuntimeContext, args: &TemplateRenderArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let template = ws.store.get_template(args.id)?;

    let document = match &args.document {
        Some(id) => {
            let doc = ws.store.get_document(id)?;
            if doc.template_id != template.id {
                bail!(
                    "document {} uses template {}, not {}",
                    doc.id,
                    doc.template_id,
                    template.id
                );
            }
            Some(doc)
        }
        None => None,
    };
    let sheets = render_sheets(&template, document.as_ref().map(|d| &d.form_data));

    if ctx.json {
        output_json(&sheets);
        return Ok(());
    }
    for (i, sheet) in sheets.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("<!-- sheet: {} -->", sheet.name);
        println!("{}", sheet.html);
    }
    Ok(())
}

fn run_publish(ctx: &RuntimeContext, args: &TemplateIdArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let template = ws
        .store
        .publish_template(args.id, Utc::now())
        .with_context(|| format!("failed to publish template {}", args.id))?;

    if ctx.json {
        output_json(&template);
    } else if !ctx.quiet {
        println!("Published template {} (id {})", template.label(), template.id);
    }
    Ok(())
}

fn run_expire(ctx: &RuntimeContext, args: &TemplateExpireArgs) -> Result<()> {
    let at = match &args.at {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid --at '{raw}' (expected RFC 3339)"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    if args.reason.trim().is_empty() {
        bail!("an expiry reason is required");
    }

    let ws = ctx.open_workspace()?;
    let template = ws
        .store
        .expire_template(args.id, args.reason.trim(), at)
        .with_context(|| format!("failed to expire template {}", args.id))?;

    if ctx.json {
        output_json(&template);
    } else if !ctx.quiet {
        println!(
            "Template {} stops accepting documents at {}",
            template.label(),
            format_time(&at)
        );
    }
    Ok(())
}
