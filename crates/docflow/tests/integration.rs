//! End-to-end CLI integration tests for the `docflow` binary.
//!
//! Each test creates its own temporary directory, initializes a workspace,
//! and runs the binary as a subprocess via `assert_cmd`.

use std::fs;

use assert_cmd::Command;
use chrono::{Duration, Utc};
use predicates::prelude::*;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const TEMPLATE_TOML: &str = r#"
name = "Purchase order"
calculation_script = '''
total = getValue("Main:A1") + getValue("Main:A2")
setValue("Main:A3", total)
'''

[[sheets]]
name = "Main"
html = '<p>[text* item cell="B1"] [number qty cell="A1"] [number price cell="A2"] [number total cell="A3"] [signature boss cell="S1"]</p>'
"#;

const WORKFLOW_TOML: &str = r#"
name = "purchase"

[[steps]]
type = "checking"
approvers = ["carol"]

[[steps]]
type = "approve"
approvers = ["dave"]
signature_cell = "Main:S1"
approved_date_cell = "Main:D1"
"#;

/// Build a `Command` targeting the cargo-built `docflow` binary, isolated
/// from the caller's environment.
fn docflow(tmp: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("docflow").unwrap();
    cmd.current_dir(tmp.path())
        .env_remove("DOCFLOW_DIR")
        .env_remove("DOCFLOW_ACTOR")
        .env_remove("DOCFLOW_DB")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    cmd
}

/// Run with `--json --actor <actor>` and parse stdout, asserting success.
fn json_as(tmp: &TempDir, actor: &str, args: &[&str]) -> serde_json::Value {
    let output = docflow(tmp)
        .args(args)
        .args(["--json", "--actor", actor])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

/// Initialize a workspace with users, a template and a published workflow.
/// Returns the directory and the template id.
fn init_project() -> (TempDir, i64) {
    let tmp = TempDir::new().unwrap();
    docflow(&tmp)
        .args(["init", "--prefix", "po", "--quiet"])
        .assert()
        .success();

    for (id, name) in [("alice", "Alice"), ("carol", "Carol"), ("dave", "Dave")] {
        docflow(&tmp)
            .args(["user", "add", id, "--name", name, "--email"])
            .arg(format!("{id}@example.com"))
            .assert()
            .success();
    }

    fs::write(tmp.path().join("purchase.toml"), TEMPLATE_TOML).unwrap();
    fs::write(tmp.path().join("workflow.toml"), WORKFLOW_TOML).unwrap();

    let template = json_as(&tmp, "admin", &["template", "import", "purchase.toml"]);
    let template_id = template["id"].as_i64().unwrap();
    assert_eq!(template["status"], "draft");
    assert_eq!(template["version"], 1);

    let version = json_as(
        &tmp,
        "admin",
        &["workflow", "import", "workflow.toml", "--template", &template_id.to_string()],
    );
    assert_eq!(version["status"], "draft");
    let version_id = version["id"].as_i64().unwrap().to_string();
    let published = json_as(&tmp, "admin", &["workflow", "publish", &version_id]);
    assert_eq!(published["status"], "published");
    let template = json_as(&tmp, "admin", &["template", "publish", &template_id.to_string()]);
    assert_eq!(template["status"], "published");

    (tmp, template_id)
}

fn create_doc(tmp: &TempDir, template_id: i64, title: &str) -> String {
    let doc = json_as(
        tmp,
        "alice",
        &["doc", "create", "--template", &template_id.to_string(), "--title", title],
    );
    doc["id"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

#[test]
fn init_writes_config_and_refuses_second_run() {
    let tmp = TempDir::new().unwrap();
    docflow(&tmp)
        .args(["init", "--prefix", "po"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docflow initialized successfully"));

    let config = fs::read_to_string(tmp.path().join(".docflow/config.yaml")).unwrap();
    assert!(config.contains("id_prefix: po"), "{config}");
    assert!(tmp.path().join(".docflow/docflow.db").exists());

    docflow(&tmp)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn commands_outside_a_workspace_fail() {
    let tmp = TempDir::new().unwrap();
    docflow(&tmp)
        .args(["user", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("docflow init"));
}

#[test]
fn template_fields_and_render() {
    let (tmp, template_id) = init_project();
    let id = template_id.to_string();

    let fields = json_as(&tmp, "admin", &["template", "fields", &id]);
    let names: Vec<&str> = fields
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["item", "qty", "price", "total", "boss"]);
    assert_eq!(fields[0]["required"], true);

    docflow(&tmp)
        .args(["template", "render", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("<!-- sheet: Main -->"))
        .stdout(predicate::str::contains(r#"name="form_data[Main][A1]""#))
        .stdout(predicate::str::contains(r#"data-field="qty""#));
}

// ---------------------------------------------------------------------------
// Flow: checking then approve, with form calculation and signature
// ---------------------------------------------------------------------------

#[test]
fn documents_need_a_published_unexpired_template() {
    let (tmp, v1) = init_project();

    // A re-import is a new draft version; nothing can be filed against it yet.
    let draft = json_as(&tmp, "admin", &["template", "import", "purchase.toml"]);
    assert_eq!(draft["version"], 2);
    assert_eq!(draft["parent_id"], v1);
    let v2 = draft["id"].as_i64().unwrap().to_string();
    docflow(&tmp)
        .args(["doc", "create", "--template", &v2, "--title", "Chairs", "--actor", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not accepting documents (draft)"));

    let past = (Utc::now() - Duration::minutes(1)).to_rfc3339();
    json_as(
        &tmp,
        "admin",
        &["template", "expire", &v1.to_string(), "--reason", "price list changed", "--at", &past],
    );
    docflow(&tmp)
        .args(["doc", "create", "--template", &v1.to_string(), "--title", "Desk", "--actor", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expired: price list changed"));

    docflow(&tmp)
        .args(["template", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("VERSION").and(predicate::str::contains("draft")));
}

#[test]
fn full_approval_flow() {
    let (tmp, template_id) = init_project();
    let id = create_doc(&tmp, template_id, "Laptop");
    assert!(id.starts_with("po-"), "id should start with po-: {id}");

    let form = json_as(
        &tmp,
        "alice",
        &["doc", "save", &id, "--set", "Main:A1=2", "--set", "Main:A2=3", "--set", "Main:B1=Laptop"],
    );
    assert_eq!(form["Main"]["A3"], 5);
    assert_eq!(form["Main"]["B1"], "Laptop");

    let submitted = json_as(&tmp, "alice", &["doc", "submit", &id]);
    assert_eq!(submitted["status"], "pending_checking");
    assert_eq!(submitted["current_step"], 1);

    // Dave's step is not active yet.
    docflow(&tmp)
        .args(["doc", "approve", &id, "--actor", "dave"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not an active approver"));

    let checked = json_as(&tmp, "carol", &["doc", "approve", &id, "--comment", "numbers ok"]);
    assert_eq!(checked["status"], "pending");
    assert_eq!(checked["current_step"], 2);

    let approved = json_as(&tmp, "dave", &["doc", "approve", &id]);
    assert_eq!(approved["status"], "approved");
    assert!(approved["approved_at"].is_string());
    assert_eq!(approved["form_data"]["Main"]["S1"]["type"], "signature");
    assert_eq!(approved["form_data"]["Main"]["S1"]["approver_id"], "dave");
    assert!(approved["form_data"]["Main"]["D1"].is_string());

    // Form is locked and the approval cannot be pulled back.
    docflow(&tmp)
        .args(["doc", "save", &id, "--set", "Main:A1=9", "--actor", "alice"])
        .assert()
        .failure();
    docflow(&tmp)
        .args(["doc", "recall", &id, "--actor", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("recall not permitted"));

    let log = json_as(&tmp, "alice", &["doc", "log", &id]);
    let actions: Vec<&str> = log
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["created", "edited", "submitted", "checked", "approved"]);

    let outbox = json_as(&tmp, "alice", &["notifications"]);
    let sent: Vec<(String, String)> = outbox
        .as_array()
        .unwrap()
        .iter()
        .map(|n| {
            (
                n["kind"].as_str().unwrap().to_string(),
                n["recipient"].as_str().unwrap().to_string(),
            )
        })
        .collect();
    assert!(sent.contains(&("approval_requested".into(), "dave@example.com".into())));
    assert!(sent.contains(&("approved".into(), "alice@example.com".into())));
    // Checking steps do not mail their assignees.
    assert!(!sent.iter().any(|(_, to)| to == "carol@example.com"));
}

#[test]
fn reject_and_recall() {
    let (tmp, template_id) = init_project();

    let rejected = create_doc(&tmp, template_id, "Chair");
    json_as(&tmp, "alice", &["doc", "submit", &rejected]);
    let doc = json_as(&tmp, "carol", &["doc", "reject", &rejected, "--comment", "too expensive"]);
    assert_eq!(doc["status"], "rejected");

    let recalled = create_doc(&tmp, template_id, "Desk");
    json_as(&tmp, "alice", &["doc", "submit", &recalled]);
    docflow(&tmp)
        .args(["doc", "recall", &recalled, "--actor", "carol"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("only the creator"));
    let doc = json_as(&tmp, "alice", &["doc", "recall", &recalled]);
    assert_eq!(doc["status"], "draft");
    assert_eq!(doc["round"], 2);

    let drafts = json_as(&tmp, "alice", &["doc", "list", "--status", "draft"]);
    let ids: Vec<&str> = drafts
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![recalled.as_str()]);
}

#[test]
fn submit_with_assignment_override() {
    let (tmp, template_id) = init_project();
    let id = create_doc(&tmp, template_id, "Monitor");

    let doc = json_as(&tmp, "alice", &["doc", "submit", &id, "--assign", "1=dave"]);
    let approvers: Vec<&str> = doc["approvers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["approver_id"].as_str().unwrap())
        .collect();
    assert_eq!(approvers, vec!["dave"]);
}

#[test]
fn failing_script_reports_statement_and_keeps_form() {
    let (tmp, _) = init_project();
    fs::write(
        tmp.path().join("broken.toml"),
        r#"
name = "Broken"
calculation_script = '''
setValue("Main:A2", 1)
setValue("nowhere", 2)
'''
[[sheets]]
name = "Main"
html = '<p>[number qty cell="A1"]</p>'
"#,
    )
    .unwrap();
    let template = json_as(&tmp, "admin", &["template", "import", "broken.toml"]);
    let template_id = template["id"].as_i64().unwrap();
    let version = {
        fs::write(
            tmp.path().join("broken-flow.toml"),
            "name = \"broken\"\n[[steps]]\ntype = \"approve\"\napprovers = [\"carol\"]\n",
        )
        .unwrap();
        json_as(
            &tmp,
            "admin",
            &["workflow", "import", "broken-flow.toml", "--template", &template_id.to_string()],
        )
    };
    json_as(&tmp, "admin", &["workflow", "publish", &version["id"].to_string()]);
    let id = create_doc(&tmp, template_id, "Broken form");

    docflow(&tmp)
        .args(["doc", "save", &id, "--set", "Main:A1=4", "--actor", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("statement 2"))
        .stderr(predicate::str::contains("was not saved"));

    let doc = json_as(&tmp, "alice", &["doc", "show", &id]);
    assert!(doc["form_data"].as_object().unwrap().is_empty());
}

#[test]
fn json_errors_are_structured() {
    let (tmp, _) = init_project();
    docflow(&tmp)
        .args(["doc", "show", "po-missing", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""));
}

// ---------------------------------------------------------------------------
// Overdue reminders
// ---------------------------------------------------------------------------

/// A submitted document whose checking step is done, so it waits on dave's
/// approve step from now on.
fn awaiting_dave(tmp: &TempDir, template_id: i64) -> String {
    let id = create_doc(tmp, template_id, "Laptop");
    json_as(tmp, "alice", &["doc", "submit", &id]);
    let doc = json_as(tmp, "carol", &["doc", "approve", &id]);
    assert_eq!(doc["status"], "pending");
    id
}

#[test]
fn remind_is_idempotent() {
    let (tmp, template_id) = init_project();
    let id = awaiting_dave(&tmp, template_id);

    let early = (Utc::now() + Duration::days(1)).to_rfc3339();
    let report = json_as(&tmp, "admin", &["remind", "--now", &early]);
    assert_eq!(report["sent"], 0);

    let late = (Utc::now() + Duration::days(4)).to_rfc3339();
    let report = json_as(&tmp, "admin", &["remind", "--now", &late]);
    assert_eq!(report["sent"], 1);
    assert_eq!(report["reminders"][0]["approver_id"], "dave");
    assert_eq!(report["reminders"][0]["document_ids"][0], id.as_str());

    let report = json_as(&tmp, "admin", &["remind", "--now", &late]);
    assert_eq!(report["sent"], 0);

    let outbox = json_as(&tmp, "admin", &["notifications"]);
    let reminders = outbox
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["kind"] == "overdue_reminder")
        .count();
    assert_eq!(reminders, 1);
}

#[test]
fn remind_threshold_flag_overrides_config() {
    let (tmp, template_id) = init_project();
    awaiting_dave(&tmp, template_id);

    let soon = (Utc::now() + Duration::days(1) + Duration::hours(1)).to_rfc3339();
    let report = json_as(&tmp, "admin", &["remind", "--now", &soon, "--threshold-days", "1"]);
    assert_eq!(report["sent"], 1);
}

#[test]
fn overlapping_remind_run_exits_cleanly() {
    let (tmp, _) = init_project();
    let _held = docflow_lockfile::BatchLock::try_acquire(tmp.path().join(".docflow/remind.lock"))
        .unwrap();

    docflow(&tmp)
        .arg("remind")
        .assert()
        .success()
        .stdout(predicate::str::contains("in progress"));
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

#[test]
fn config_show_reflects_file() {
    let (tmp, _) = init_project();
    let config = json_as(&tmp, "admin", &["config", "show"]);
    assert_eq!(config["id_prefix"], "po");
    assert_eq!(config["overdue"]["threshold_days"], 3);
    assert_eq!(config["notify"]["backend"], "outbox");

    let meta = json_as(&tmp, "admin", &["config", "db"]);
    assert!(meta["schema_version"].is_string());
    assert!(meta["initialized_at"].is_string());
    assert_eq!(meta["initialized_by"], "unknown");
    // The id prefix lives only in config.yaml.
    assert!(meta.get("id_prefix").is_none());
}

#[test]
fn version_and_completion() {
    let tmp = TempDir::new().unwrap();
    docflow(&tmp)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("docflow version"));
    docflow(&tmp)
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docflow"));
}
