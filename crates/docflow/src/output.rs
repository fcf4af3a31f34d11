//! Output formatting helpers for the `docflow` CLI.
//!
//! JSON goes through [`output_json`]; human output uses aligned tables and a
//! detailed document view.

use std::io::{self, Write};

use serde::Serialize;

use docflow_core::approver::DocumentApprover;
use docflow_core::document::Document;
use docflow_ui::styles::{
    render_approval_status, render_bold, render_category, render_muted, render_status,
    render_step_type,
};

/// Print `value` as pretty JSON on stdout.
pub fn output_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            // Ignore broken pipe errors (e.g., piped to `head`)
            let _ = writeln!(handle, "{}", json);
        }
        Err(e) => {
            eprintln!("Error: failed to serialize JSON: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print a simple table with headers and rows.
///
/// Column widths are computed from the data for alignment.
pub fn output_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = write!(handle, "{}", format_table(headers, rows));
}

fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut out = String::new();
    let line = |out: &mut String, cells: Vec<String>| {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths.get(i).copied().unwrap_or(0)))
            .collect();
        out.push_str(padded.join("  ").trim_end());
        out.push('\n');
    };

    line(&mut out, headers.iter().map(|h| h.to_string()).collect());
    line(&mut out, widths.iter().map(|w| "-".repeat(*w)).collect());
    for row in rows {
        line(&mut out, row.clone());
    }
    out
}

/// Timestamps in tables: minute precision, UTC.
pub fn format_time(at: &chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Multi-line view of a document and its approver rows for the current
/// round.
pub fn format_document_detail(doc: &Document, approvers: &[DocumentApprover]) -> String {
    let mut lines = vec![
        format!("{} {}", render_bold(&doc.id), doc.title),
        format!("Status:    {}", render_status(doc.status)),
    ];
    if doc.status.is_in_flight() {
        lines.push(format!("Step:      {}", doc.current_step));
    }
    lines.push(format!("Round:     {}", doc.round));
    lines.push(format!("Creator:   {}", doc.creator_id));
    lines.push(format!(
        "Template:  {} (workflow version {})",
        doc.template_id, doc.workflow_version_id
    ));
    lines.push(format!("Created:   {}", format_time(&doc.created_at)));
    if let Some(at) = doc.submitted_at {
        lines.push(format!("Submitted: {}", format_time(&at)));
    }
    if let Some(at) = doc.approved_at {
        lines.push(format!("Approved:  {}", format_time(&at)));
    }

    if !approvers.is_empty() {
        lines.push(String::new());
        lines.push(render_category("Approvers"));
        for row in approvers {
            let when = row
                .approved_at
                .or(row.rejected_at)
                .map(|at| format!(" {}", render_muted(&format_time(&at))))
                .unwrap_or_default();
            let comment = row
                .comment
                .as_deref()
                .map(|c| format!(" \"{c}\""))
                .unwrap_or_default();
            lines.push(format!(
                "  {}. {} {} [{}]{}{}",
                row.step_order,
                render_step_type(row.step_type),
                row.approver_id,
                render_approval_status(row.status),
                when,
                comment
            ));
        }
    }

    if !doc.form_data.is_empty() {
        lines.push(String::new());
        lines.push(render_category("Form data"));
        for (sheet, cells) in doc.form_data.sheets() {
            for (cell, value) in cells {
                let shown = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                lines.push(format!("  {sheet}:{cell} = {shown}"));
            }
        }
    }

    lines.join("\n")
}
