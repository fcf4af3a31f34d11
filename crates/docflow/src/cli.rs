//! Clap CLI definitions for the `docflow` command.
//!
//! The command tree is grouped by entity: users, templates, workflow
//! versions and documents, plus the `remind` batch entry point.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// docflow -- Multi-step document approval.
#[derive(Parser, Debug)]
#[command(
    name = "docflow",
    about = "Multi-step document approval workflows",
    long_about = "Form templates, versioned approval workflows and documents that move through prepare, checking and approve steps.",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Database path (default: .docflow/docflow.db).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Acting user id (default: $DOCFLOW_ACTOR, config `actor`, $USER).
    #[arg(long, global = true, env = "DOCFLOW_ACTOR")]
    pub actor: Option<String>,

    /// Output in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose/debug output.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output (errors only).
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,
}

/// All available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a docflow workspace in the current directory.
    Init(InitArgs),

    /// Manage users.
    User(UserArgs),

    /// Manage form templates.
    Template(TemplateArgs),

    /// Manage workflow versions.
    Workflow(WorkflowArgs),

    /// Create documents and move them through approval.
    #[command(alias = "document")]
    Doc(DocArgs),

    /// Send reminders for stalled approvals.
    Remind(RemindArgs),

    /// List recorded notifications (outbox backend).
    Notifications(NotificationsArgs),

    /// Show configuration.
    Config(ConfigArgs),

    /// Generate shell completions.
    Completion(CompletionArgs),

    /// Print version information.
    Version,
}

// ---------------------------------------------------------------------------
// Init
// ---------------------------------------------------------------------------

/// Arguments for `docflow init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Document id prefix (default: doc).
    #[arg(short = 'p', long)]
    pub prefix: Option<String>,

    /// Re-initialize even if a database already exists.
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommands,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a user.
    Add(UserAddArgs),
    /// List users.
    List,
}

#[derive(Args, Debug)]
pub struct UserAddArgs {
    /// User id.
    pub id: String,

    /// Display name.
    #[arg(long)]
    pub name: String,

    /// Notification address.
    #[arg(long)]
    pub email: Option<String>,
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct TemplateArgs {
    #[command(subcommand)]
    pub command: TemplateCommands,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// Import a template definition (TOML or JSON).
    Import(TemplateImportArgs),
    /// List templates.
    List,
    /// Show a template.
    Show(TemplateIdArgs),
    /// List the input fields declared in a template's sheets.
    Fields(TemplateIdArgs),
    /// Render a template's sheets as form HTML.
    Render(TemplateRenderArgs),
    /// Publish a draft version so documents can be created from it.
    Publish(TemplateIdArgs),
    /// Stop accepting new documents from a published version.
    Expire(TemplateExpireArgs),
}

#[derive(Args, Debug)]
pub struct TemplateImportArgs {
    /// Definition file.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct TemplateIdArgs {
    /// Template id.
    pub id: i64,
}

#[derive(Args, Debug)]
pub struct TemplateExpireArgs {
    /// Template id.
    pub id: i64,

    /// Why the version is retired.
    #[arg(long)]
    pub reason: String,

    /// When it stops accepting documents (RFC 3339, default now).
    #[arg(long)]
    pub at: Option<String>,
}

#[derive(Args, Debug)]
pub struct TemplateRenderArgs {
    /// Template id.
    pub id: i64,

    /// Fill inputs from this document's form data.
    #[arg(long)]
    pub document: Option<String>,
}

// ---------------------------------------------------------------------------
// Workflows
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub command: WorkflowCommands,
}

#[derive(Subcommand, Debug)]
pub enum WorkflowCommands {
    /// Import a workflow definition as a new draft version.
    Import(WorkflowImportArgs),
    /// List workflow versions.
    List(WorkflowListArgs),
    /// Show a workflow version and its steps.
    Show(WorkflowIdArgs),
    /// Publish a draft version, archiving the previous one.
    Publish(WorkflowIdArgs),
}

#[derive(Args, Debug)]
pub struct WorkflowImportArgs {
    /// Definition file.
    pub file: PathBuf,

    /// Template the workflow belongs to.
    #[arg(long)]
    pub template: i64,
}

#[derive(Args, Debug)]
pub struct WorkflowListArgs {
    /// Only versions bound to this template.
    #[arg(long)]
    pub template: Option<i64>,
}

#[derive(Args, Debug)]
pub struct WorkflowIdArgs {
    /// Workflow version id.
    pub id: i64,
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct DocArgs {
    #[command(subcommand)]
    pub command: DocCommands,
}

#[derive(Subcommand, Debug)]
pub enum DocCommands {
    /// Create a draft document.
    Create(DocCreateArgs),
    /// Show a document with its approvers.
    Show(DocIdArgs),
    /// List documents.
    List(DocListArgs),
    /// Save form data and run the template's calculation script.
    Save(DocSaveArgs),
    /// Submit a draft into its first step.
    Submit(DocSubmitArgs),
    /// Sign off the active step.
    Approve(DocDecisionArgs),
    /// Reject the document.
    Reject(DocDecisionArgs),
    /// Pull the document back one step (creator only).
    Recall(DocIdArgs),
    /// Show the activity log.
    Log(DocIdArgs),
}

#[derive(Args, Debug)]
pub struct DocCreateArgs {
    /// Template id.
    #[arg(long)]
    pub template: i64,

    /// Document title.
    #[arg(long)]
    pub title: String,

    /// Workflow version id (default: the template's published version).
    #[arg(long)]
    pub workflow: Option<i64>,
}

#[derive(Args, Debug)]
pub struct DocIdArgs {
    /// Document id.
    pub id: String,
}

#[derive(Args, Debug)]
pub struct DocListArgs {
    /// Filter by status.
    #[arg(short = 's', long)]
    pub status: Option<String>,

    /// Filter by creator.
    #[arg(long)]
    pub creator: Option<String>,

    /// Filter by template id.
    #[arg(long)]
    pub template: Option<i64>,

    /// Maximum number of documents.
    #[arg(short = 'n', long)]
    pub limit: Option<i64>,
}

#[derive(Args, Debug)]
pub struct DocSaveArgs {
    /// Document id.
    pub id: String,

    /// JSON file holding `{"Sheet": {"Cell": value}}`.
    #[arg(long, conflicts_with = "set")]
    pub data: Option<PathBuf>,

    /// Set one cell: `Sheet:Cell=value` (repeatable).
    #[arg(long = "set", value_name = "SHEET:CELL=VALUE")]
    pub set: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DocSubmitArgs {
    /// Document id.
    pub id: String,

    /// Override a step's approvers: `STEP=user[,user...]` (repeatable).
    #[arg(long = "assign", value_name = "STEP=USERS")]
    pub assign: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DocDecisionArgs {
    /// Document id.
    pub id: String,

    /// Comment recorded with the decision.
    #[arg(short = 'c', long)]
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Remind / notifications
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct RemindArgs {
    /// Evaluate as of this instant (RFC 3339) instead of now.
    #[arg(long)]
    pub now: Option<String>,

    /// Override `overdue.threshold_days`.
    #[arg(long)]
    pub threshold_days: Option<i64>,
}

#[derive(Args, Debug)]
pub struct NotificationsArgs {
    /// Maximum number of entries (newest first).
    #[arg(short = 'n', long)]
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration.
    Show,
    /// Print the path of config.yaml.
    Path,
    /// Show metadata stored in the database.
    Db,
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct CompletionArgs {
    #[command(subcommand)]
    pub command: CompletionCommands,
}

#[derive(Subcommand, Debug)]
pub enum CompletionCommands {
    /// Generate Bash completions.
    Bash,
    /// Generate Zsh completions.
    Zsh,
    /// Generate Fish completions.
    Fish,
    /// Generate PowerShell completions.
    Powershell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_assignments() {
        let cli = Cli::parse_from([
            "docflow", "doc", "submit", "doc-abc123", "--assign", "1=carol", "--assign", "2=dave,erin",
        ]);
        match cli.command {
            Some(Commands::Doc(DocArgs {
                command: DocCommands::Submit(args),
            })) => assert_eq!(args.assign, vec!["1=carol", "2=dave,erin"]),
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["docflow", "user", "list", "--json", "--actor", "alice"]);
        assert!(cli.global.json);
        assert_eq!(cli.global.actor.as_deref(), Some("alice"));
    }
}
