//! `docflow remind` -- the overdue reminder batch.
//!
//! Meant to be run by an external scheduler. Overlapping runs are excluded
//! with a lock file in `.docflow/`; the loser exits successfully.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};

use docflow_approval::OverdueDetector;
use docflow_lockfile::BatchLock;

use crate::cli::RemindArgs;
use crate::context::RuntimeContext;
use crate::output::{output_json, output_table};

const LOCK_FILE: &str = "remind.lock";

pub fn run(ctx: &RuntimeContext, args: &RemindArgs) -> Result<()> {
    let now = match &args.now {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid --now '{raw}' (expected RFC 3339)"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let ws = ctx.open_workspace()?;
    let threshold_days = args.threshold_days.unwrap_or(ws.config.overdue.threshold_days);
    if threshold_days < 0 {
        bail!("threshold must not be negative (got {threshold_days})");
    }

    let lock_path = ws.require_dir()?.join(LOCK_FILE);
    let _lock = match BatchLock::try_acquire(&lock_path) {
        Ok(lock) => lock,
        Err(e) if e.is_held() => {
            if ctx.json {
                output_json(&serde_json::json!({ "skipped": "another run in progress" }));
            } else if !ctx.quiet {
                println!("Another reminder run is in progress; nothing to do.");
            }
            return Ok(());
        }
        Err(e) => return Err(e).context("failed to take the reminder lock"),
    };

    let notifier = ws.notifier();
    let report = OverdueDetector::new(Duration::days(threshold_days))
        .run(&ws.store, notifier.as_ref(), now)
        .context("reminder run failed")?;

    if ctx.json {
        output_json(&report);
        return Ok(());
    }
    if ctx.quiet {
        return Ok(());
    }
    println!(
        "Sent {} reminder(s) ({} candidate assignment(s), {} skipped without email, {} failed)",
        report.sent, report.candidates, report.skipped_no_email, report.failed
    );
    let rows: Vec<Vec<String>> = report
        .reminders
        .iter()
        .map(|r| {
            vec![
                r.approver_id.clone(),
                r.document_ids.join(","),
                r.total_pending.to_string(),
            ]
        })
        .collect();
    output_table(&["APPROVER", "DOCUMENTS", "PENDING"], &rows);
    Ok(())
}
