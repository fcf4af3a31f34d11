//! DDL statements and migrations for the SQLite schema.
//!
//! Timestamps are stored as TEXT in ISO 8601 format (SQLite has no native
//! datetime type). Sheets, steps' approver lists, assignments and form data
//! are JSON TEXT.

/// Current schema version. Bumped whenever DDL or migrations change.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Core DDL statements executed during `init_schema`.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // -- Users ---------------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id         TEXT PRIMARY KEY,
        name       TEXT NOT NULL,
        email      TEXT,
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    )
    "#,
    // -- Templates -----------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS templates (
        id                 INTEGER PRIMARY KEY AUTOINCREMENT,
        name               TEXT NOT NULL,
        version            INTEGER NOT NULL DEFAULT 1,
        status             TEXT NOT NULL DEFAULT 'draft',
        parent_id          INTEGER,
        sheets             TEXT NOT NULL DEFAULT '[]',
        calculation_script TEXT NOT NULL DEFAULT '',
        expired_at         TEXT,
        expired_reason     TEXT,
        created_at         TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        UNIQUE (name, version),
        FOREIGN KEY (parent_id) REFERENCES templates(id) ON DELETE SET NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_templates_status ON templates(status)",
    // -- Workflow versions and their steps -----------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS workflow_versions (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        version     INTEGER NOT NULL,
        template_id INTEGER NOT NULL,
        status      TEXT NOT NULL DEFAULT 'draft',
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        UNIQUE (name, version),
        FOREIGN KEY (template_id) REFERENCES templates(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_workflow_versions_template ON workflow_versions(template_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS workflow_steps (
        workflow_version_id INTEGER NOT NULL,
        step_order          INTEGER NOT NULL,
        step_type           TEXT NOT NULL,
        approvers           TEXT NOT NULL DEFAULT '[]',
        signature_cell      TEXT,
        approved_date_cell  TEXT,
        PRIMARY KEY (workflow_version_id, step_order),
        FOREIGN KEY (workflow_version_id) REFERENCES workflow_versions(id) ON DELETE CASCADE
    )
    "#,
    // -- Documents -----------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS documents (
        id                  TEXT PRIMARY KEY,
        title               TEXT NOT NULL,
        template_id         INTEGER NOT NULL,
        workflow_version_id INTEGER NOT NULL,
        creator_id          TEXT NOT NULL,
        status              TEXT NOT NULL DEFAULT 'draft',
        current_step        INTEGER NOT NULL DEFAULT 0,
        round               INTEGER NOT NULL DEFAULT 0,
        assignments         TEXT NOT NULL DEFAULT '{}',
        form_data           TEXT NOT NULL DEFAULT '{}',
        submitted_at        TEXT,
        approved_at         TEXT,
        created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        updated_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        FOREIGN KEY (template_id) REFERENCES templates(id),
        FOREIGN KEY (workflow_version_id) REFERENCES workflow_versions(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(status)",
    "CREATE INDEX IF NOT EXISTS idx_documents_creator ON documents(creator_id)",
    // -- Approver rows (append-only) -----------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS document_approvers (
        id                  INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id         TEXT NOT NULL,
        round               INTEGER NOT NULL,
        step_order          INTEGER NOT NULL,
        step_type           TEXT NOT NULL,
        approver_id         TEXT NOT NULL,
        status              TEXT NOT NULL DEFAULT 'pending',
        approved_at         TEXT,
        rejected_at         TEXT,
        comment             TEXT,
        overdue_notified_at TEXT,
        created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_approvers_step ON document_approvers(document_id, round, step_order)",
    "CREATE INDEX IF NOT EXISTS idx_approvers_approver ON document_approvers(approver_id, status)",
    // -- Activity log --------------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS activity (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id TEXT NOT NULL,
        action      TEXT NOT NULL,
        actor       TEXT NOT NULL,
        old_status  TEXT,
        new_status  TEXT,
        step_order  INTEGER,
        comment     TEXT,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
        FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_activity_document ON activity(document_id)",
    // -- Notification outbox -------------------------------------------------
    r#"
    CREATE TABLE IF NOT EXISTS notifications (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        kind       TEXT NOT NULL,
        recipient  TEXT NOT NULL,
        payload    TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    )
    "#,
    // -- Database facts: schema version, applied migrations, init stamp -----
    r#"
    CREATE TABLE IF NOT EXISTS metadata (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

/// `metadata` key holding the applied schema version.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Schema migrations applied after initial DDL.
///
/// `(name, sql)` pairs, each recorded as `migration:<name>` in `metadata`
/// once applied.
pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_approvers_notified_index",
    "CREATE INDEX IF NOT EXISTS idx_approvers_notified ON document_approvers(status, overdue_notified_at)",
)];
