//! `docflow doc` -- create documents and drive them through approval.

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use docflow_approval::WorkflowError;
use docflow_core::approver::DocumentApprover;
use docflow_core::document::{Assignments, Document};
use docflow_core::enums::DocumentStatus;
use docflow_core::filter::{ApproverFilter, DocumentFilter};
use docflow_core::form_data::{CellRef, FormData};
use docflow_storage::Storage;
use docflow_ui::styles::render_document_compact;

use crate::cli::{
    DocArgs, DocCommands, DocCreateArgs, DocDecisionArgs, DocIdArgs, DocListArgs, DocSaveArgs,
    DocSubmitArgs,
};
use crate::context::{RuntimeContext, Workspace};
use crate::output::{format_document_detail, format_time, output_json, output_table};

/// JSON shape of `doc show`.
#[derive(Serialize)]
struct DocumentView<'a> {
    #[serde(flatten)]
    document: &'a Document,
    approvers: &'a [DocumentApprover],
}

pub fn run(ctx: &RuntimeContext, args: &DocArgs) -> Result<()> {
    match &args.command {
        DocCommands::Create(a) => run_create(ctx, a),
        DocCommands::Show(a) => run_show(ctx, a),
        DocCommands::List(a) => run_list(ctx, a),
        DocCommands::Save(a) => run_save(ctx, a),
        DocCommands::Submit(a) => run_submit(ctx, a),
        DocCommands::Approve(a) => run_approve(ctx, a),
        DocCommands::Reject(a) => run_reject(ctx, a),
        DocCommands::Recall(a) => run_recall(ctx, a),
        DocCommands::Log(a) => run_log(ctx, a),
    }
}

fn run_create(ctx: &RuntimeContext, args: &DocCreateArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let notifier = ws.notifier();
    let doc = ws
        .engine(notifier.as_ref())
        .create_document(&args.title, args.template, args.workflow, &ws.actor, Utc::now())
        .context("failed to create document")?;

    if ctx.json {
        output_json(&doc);
    } else if ctx.quiet {
        println!("{}", doc.id);
    } else {
        println!("Created document {}: {}", doc.id, doc.title);
    }
    Ok(())
}

fn run_show(ctx: &RuntimeContext, args: &DocIdArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let doc = ws.store.get_document(&args.id)?;
    let approvers = current_round_rows(&ws, &doc)?;

    if ctx.json {
        output_json(&DocumentView {
            document: &doc,
            approvers: &approvers,
        });
    } else {
        println!("{}", format_document_detail(&doc, &approvers));
    }
    Ok(())
}

fn run_list(ctx: &RuntimeContext, args: &DocListArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let status = args
        .status
        .as_deref()
        .map(str::parse::<DocumentStatus>)
        .transpose()?;
    let docs = ws.store.list_documents(&DocumentFilter {
        status,
        creator_id: args.creator.clone(),
        template_id: args.template,
        limit: args.limit,
    })?;

    if ctx.json {
        output_json(&docs);
        return Ok(());
    }
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in &docs {
        println!("{}", render_document_compact(doc));
    }
    Ok(())
}

fn run_save(ctx: &RuntimeContext, args: &DocSaveArgs) -> Result<()> {
    let input = match &args.data {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str::<FormData>(&content)
                .with_context(|| format!("failed to parse form data in {}", path.display()))?
        }
        None => {
            if args.set.is_empty() {
                bail!("nothing to save: pass --data <file> or --set Sheet:Cell=value");
            }
            let mut form = FormData::new();
            for raw in &args.set {
                let (at, value) = parse_cell_assignment(raw)?;
                form.set(&at, value);
            }
            form
        }
    };

    let ws = ctx.open_workspace()?;
    let notifier = ws.notifier();
    let saved = match ws
        .engine(notifier.as_ref())
        .save_form(&args.id, &ws.actor, &input, Utc::now())
    {
        Ok(saved) => saved,
        Err(WorkflowError::Formula(e)) => {
            return Err(anyhow::Error::new(e).context(format!(
                "calculation script failed; document {} was not saved",
                args.id
            )));
        }
        Err(e) => return Err(e.into()),
    };

    if ctx.json {
        output_json(&saved);
    } else if !ctx.quiet {
        println!("Saved form data for {}", args.id);
    }
    Ok(())
}

fn run_submit(ctx: &RuntimeContext, args: &DocSubmitArgs) -> Result<()> {
    let mut overrides = Assignments::new();
    for raw in &args.assign {
        let (step, users) = parse_assignment(raw)?;
        overrides.entry(step).or_default().extend(users);
    }

    let ws = ctx.open_workspace()?;
    let notifier = ws.notifier();
    let doc = ws
        .engine(notifier.as_ref())
        .submit(&args.id, &ws.actor, &overrides, Utc::now())?;
    report_transition(ctx, &ws, &doc, "Submitted")
}

fn run_approve(ctx: &RuntimeContext, args: &DocDecisionArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let notifier = ws.notifier();
    let doc = ws.engine(notifier.as_ref()).approve(
        &args.id,
        &ws.actor,
        args.comment.clone(),
        Utc::now(),
    )?;
    report_transition(ctx, &ws, &doc, "Approved")
}

fn run_reject(ctx: &RuntimeContext, args: &DocDecisionArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let notifier = ws.notifier();
    let doc = ws.engine(notifier.as_ref()).reject(
        &args.id,
        &ws.actor,
        args.comment.clone(),
        Utc::now(),
    )?;
    report_transition(ctx, &ws, &doc, "Rejected")
}

fn run_recall(ctx: &RuntimeContext, args: &DocIdArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let notifier = ws.notifier();
    let doc = ws
        .engine(notifier.as_ref())
        .recall(&args.id, &ws.actor, Utc::now())?;
    report_transition(ctx, &ws, &doc, "Recalled")
}

fn run_log(ctx: &RuntimeContext, args: &DocIdArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    ws.store.get_document(&args.id)?;
    let entries = ws.store.get_activity(&args.id)?;

    if ctx.json {
        output_json(&entries);
        return Ok(());
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            let transition = match (e.old_status, e.new_status) {
                (Some(old), Some(new)) => format!("{old} -> {new}"),
                (None, Some(new)) => new.to_string(),
                _ => String::new(),
            };
            vec![
                format_time(&e.created_at),
                e.action.to_string(),
                e.actor.clone(),
                transition,
                e.step_order.map(|s| s.to_string()).unwrap_or_default(),
                e.comment.clone().unwrap_or_default(),
            ]
        })
        .collect();
    output_table(&["TIME", "ACTION", "ACTOR", "STATUS", "STEP", "COMMENT"], &rows);
    Ok(())
}

fn report_transition(ctx: &RuntimeContext, ws: &Workspace, doc: &Document, verb: &str) -> Result<()> {
    if ctx.json {
        let approvers = current_round_rows(ws, doc)?;
        output_json(&DocumentView {
            document: doc,
            approvers: &approvers,
        });
    } else if !ctx.quiet {
        println!("{verb} {}", render_document_compact(doc));
    }
    Ok(())
}

fn current_round_rows(ws: &Workspace, doc: &Document) -> Result<Vec<DocumentApprover>> {
    if doc.round == 0 {
        return Ok(Vec::new());
    }
    let filter = ApproverFilter {
        round: Some(doc.round),
        ..ApproverFilter::for_document(&doc.id)
    };
    Ok(ws.store.find_approvers(&filter)?)
}

/// Parses `Sheet:Cell=value`. Numeric text is stored as a number.
fn parse_cell_assignment(raw: &str) -> Result<(CellRef, Value)> {
    let Some((target, value)) = raw.split_once('=') else {
        bail!("invalid --set '{raw}' (expected Sheet:Cell=value)");
    };
    let at: CellRef = target.trim().parse()?;
    Ok((at, parse_cell_value(value)))
}

fn parse_cell_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(raw.to_string())
}

/// Parses `STEP=user[,user...]`.
fn parse_assignment(raw: &str) -> Result<(u32, Vec<String>)> {
    let Some((step, users)) = raw.split_once('=') else {
        bail!("invalid --assign '{raw}' (expected STEP=user[,user...])");
    };
    let step: u32 = step
        .trim()
        .parse()
        .with_context(|| format!("invalid step number in --assign '{raw}'"))?;
    let users: Vec<String> = users
        .split(',')
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect();
    if users.is_empty() {
        bail!("--assign '{raw}' names no users");
    }
    Ok((step, users))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cell_assignment_numbers_and_text() {
        let (at, value) = parse_cell_assignment("Main:A1=42").unwrap();
        assert_eq!(at, CellRef::new("Main", "A1"));
        assert_eq!(value, Value::from(42));

        let (_, value) = parse_cell_assignment("Main:A2=2.5").unwrap();
        assert_eq!(value, Value::from(2.5));

        let (_, value) = parse_cell_assignment("Main:B1=Dell XPS = 13").unwrap();
        assert_eq!(value, Value::from("Dell XPS = 13"));
    }

    #[test]
    fn cell_assignment_rejects_bad_reference() {
        assert!(parse_cell_assignment("A1=3").is_err());
        assert!(parse_cell_assignment("Main:A1").is_err());
    }

    #[test]
    fn assignment_lists_users() {
        assert_eq!(
            parse_assignment("2=dave, erin").unwrap(),
            (2, vec!["dave".to_string(), "erin".to_string()])
        );
        assert!(parse_assignment("x=dave").is_err());
        assert!(parse_assignment("1=").is_err());
    }

    #[test]
    fn non_finite_text_stays_text() {
        assert_eq!(parse_cell_value("inf"), Value::from("inf"));
        assert_eq!(parse_cell_value("NaN"), Value::from("NaN"));
    }
}
