//! `docflow user` -- register and list users.

use anyhow::{Context, Result, bail};

use docflow_core::user::User;
use docflow_storage::Storage;

use crate::cli::{UserAddArgs, UserArgs, UserCommands};
use crate::context::RuntimeContext;
use crate::output::{output_json, output_table};

pub fn run(ctx: &RuntimeContext, args: &UserArgs) -> Result<()> {
    match &args.command {
        UserCommands::Add(add) => run_add(ctx, add),
        UserCommands::List => run_list(ctx),
    }
}

fn run_add(ctx: &RuntimeContext, args: &UserAddArgs) -> Result<()> {
    let id = args.id.trim();
    if id.is_empty() {
        bail!("user id must not be empty");
    }
    let ws = ctx.open_workspace()?;

    let mut user = User::new(id, args.name.trim());
    if let Some(email) = args.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        user = user.with_email(email);
    }
    ws.store
        .create_user(&user)
        .with_context(|| format!("failed to add user {id}"))?;

    if ctx.json {
        output_json(&user);
    } else if !ctx.quiet {
        println!("Added user {} ({})", user.id, user.name);
    }
    Ok(())
}

fn run_list(ctx: &RuntimeContext) -> Result<()> {
    let ws = ctx.open_workspace()?;
    let users = ws.store.list_users()?;

    if ctx.json {
        output_json(&users);
        return Ok(());
    }
    if users.is_empty() {
        println!("No users.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = users
        .iter()
        .map(|u| vec![u.id.clone(), u.name.clone(), u.email.clone().unwrap_or_default()])
        .collect();
    output_table(&["ID", "NAME", "EMAIL"], &rows);
    Ok(())
}
