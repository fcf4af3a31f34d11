//! `docflow notifications` -- list the notification outbox.

use anyhow::Result;

use docflow_storage::Storage;

use crate::cli::NotificationsArgs;
use crate::context::RuntimeContext;
use crate::output::{format_time, output_json, output_table};

pub fn run(ctx: &RuntimeContext, args: &NotificationsArgs) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let entries = ws.store.list_notifications(args.limit)?;

    if ctx.json {
        output_json(&entries);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No notifications.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|n| {
            let document = n
                .payload
                .pointer("/document/id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            vec![
                n.id.to_string(),
                format_time(&n.created_at),
                n.kind.to_string(),
                n.recipient.clone(),
                document,
            ]
        })
        .collect();
    output_table(&["ID", "CREATED", "KIND", "RECIPIENT", "DOCUMENT"], &rows);
    Ok(())
}
