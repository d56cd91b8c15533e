//! Integration tests for the lineage CLI
//!
//! Each test runs the binary against a fresh temporary workspace, with HOME
//! pointed at a temporary directory so no global config leaks in.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

struct Workspace {
    home: TempDir,
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("Failed to create home dir"),
            dir: TempDir::new().expect("Failed to create workspace dir"),
        }
    }

    /// Workspace with `lineage init` already run
    fn initialized() -> Self {
        let ws = Self::new();
        ws.cmd().arg("init").assert().success();
        ws
    }

    #[allow(deprecated)]
    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("lineage").expect("Failed to find lineage binary");
        cmd.env("HOME", self.home.path())
            .env_remove("RUST_LOG")
            .env_remove("LINEAGE_WORKSPACE")
            .env_remove("LINEAGE_CONFIG")
            .env_remove("LINEAGE_DATA_DIR")
            .arg("--workspace")
            .arg(self.dir.path());
        cmd
    }

    /// Run a command that must succeed and parse its stdout as JSON
    fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().args(args).output().expect("Failed to run lineage");
        assert!(
            output.status.success(),
            "lineage {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
    }

    fn id(&self, args: &[&str]) -> String {
        self.json(args)["id"].as_i64().expect("missing id").to_string()
    }
}

fn node_ids(view: &Value) -> Vec<String> {
    let mut ids: Vec<String> = view["nodes"]
        .as_array()
        .expect("nodes array")
        .iter()
        .map(|n| n["id"].as_str().unwrap_or_default().to_string())
        .collect();
    ids.sort();
    ids
}

/// orders -> order_summary -> report, returning the three table ids
fn seed_chain(ws: &Workspace) -> (String, String, String) {
    ws.json(&["metadata", "add-source", "warehouse", "--type", "oracle"]);
    let orders = ws.id(&["metadata", "add-table", "warehouse", "orders"]);
    let summary = ws.id(&["metadata", "add-table", "warehouse", "order_summary"]);
    let report = ws.id(&["metadata", "add-table", "warehouse", "report"]);
    ws.json(&["table-lineage", "create", "--source", &orders, "--target", &summary]);
    ws.json(&["table-lineage", "create", "--source", &summary, "--target", &report]);
    (orders, summary, report)
}

// ============================================================================
// Init
// ============================================================================

#[test]
fn test_init_creates_database_and_config() {
    let ws = Workspace::new();
    let summary = ws.json(&["init"]);

    assert_eq!(summary["already_initialized"], false);
    assert!(ws.dir.path().join(".lineage/lineage.db").exists());
    assert!(ws.dir.path().join(".lineage/config.toml").exists());

    let again = ws.json(&["init"]);
    assert_eq!(again["already_initialized"], true);
}

#[test]
fn test_commands_require_init() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["metadata", "list-sources"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("lineage init"));
}

#[test]
fn test_data_dir_override() {
    let ws = Workspace::new();
    let data = ws.dir.path().join("elsewhere");
    ws.cmd()
        .arg("--data-dir")
        .arg(&data)
        .args(["init", "--no-config"])
        .assert()
        .success();
    assert!(data.join("lineage.db").exists());
    assert!(!ws.dir.path().join(".lineage").exists());
}

// ============================================================================
// Lineage Workflow
// ============================================================================

#[test]
fn test_table_graph_scenario() {
    let ws = Workspace::initialized();
    let (orders, summary, report) = seed_chain(&ws);

    let view = ws.json(&["graph", "table", &summary, "--depth", "2", "--direction", "both"]);
    let mut expected = vec![
        format!("table:{orders}"),
        format!("table:{summary}"),
        format!("table:{report}"),
    ];
    expected.sort();
    assert_eq!(node_ids(&view), expected);
    assert_eq!(view["edges"].as_array().map(Vec::len), Some(2));

    let up = ws.json(&["graph", "table", &summary, "--depth", "1", "--direction", "upstream"]);
    assert_eq!(up["nodes"].as_array().map(Vec::len), Some(2));
}

#[test]
fn test_graph_text_format() {
    let ws = Workspace::initialized();
    let (_, summary, _) = seed_chain(&ws);

    ws.cmd()
        .args(["graph", "table", &summary, "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nodes (3):"))
        .stdout(predicate::str::contains("order_summary [warehouse]"))
        .stdout(predicate::str::contains("Edges (2):"));
}

#[test]
fn test_depth_outside_bounds_rejected() {
    let ws = Workspace::initialized();
    let (orders, _, _) = seed_chain(&ws);

    ws.cmd()
        .args(["graph", "table", &orders, "--depth", "11"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("depth must be between 1 and 10"));
}

#[test]
fn test_layers_downstream() {
    let ws = Workspace::initialized();
    let (orders, _, _) = seed_chain(&ws);

    let layers = ws.json(&["graph", "layers", &orders, "--direction", "downstream"]);
    let layers = layers.as_array().expect("layers array");
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[0]["name"], "order_summary");
    assert_eq!(layers[0]["layer"], 1);
    assert_eq!(layers[1]["name"], "report");
    assert_eq!(layers[1]["layer"], 2);
}

#[test]
fn test_column_lineage_workflow() {
    let ws = Workspace::initialized();
    let (orders, summary, _) = seed_chain(&ws);
    let amount = ws.id(&["metadata", "add-column", &orders, "amount", "--data-type", "NUMBER"]);
    let total = ws.id(&["metadata", "add-column", &summary, "total"]);

    let edges = ws.json(&["table-lineage", "list", "--target", &summary]);
    let edge = edges[0]["id"].as_i64().expect("edge id").to_string();

    let column_edge = ws.id(&[
        "column-lineage",
        "create",
        "--lineage",
        &edge,
        "--source-column",
        &amount,
        "--target-column",
        &total,
    ]);

    ws.cmd()
        .args([
            "column-lineage",
            "create",
            "--lineage",
            &edge,
            "--source-column",
            &amount,
            "--target-column",
            &total,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("conflict"));

    let view = ws.json(&["graph", "column", &amount, "--direction", "down"]);
    let ids = node_ids(&view);
    assert!(ids.contains(&format!("column:{amount}")));
    assert!(ids.contains(&format!("column:{total}")));
    assert!(ids.contains(&format!("table:{orders}")));

    ws.cmd()
        .args(["metadata", "remove-column", &amount])
        .assert()
        .failure()
        .stderr(predicate::str::contains("referenced"));

    let deleted = ws.json(&["table-lineage", "delete", &edge]);
    assert_eq!(deleted["column_edges_removed"], 1);
    ws.cmd()
        .args(["column-lineage", "get", &column_edge])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_create_with_missing_table_reports_reference() {
    let ws = Workspace::initialized();
    let (orders, _, _) = seed_chain(&ws);

    ws.cmd()
        .args(["table-lineage", "create", "--source", &orders, "--target", "999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("target table 999"));
}

#[test]
fn test_update_relation_type() {
    let ws = Workspace::initialized();
    let (orders, summary, _) = seed_chain(&ws);
    let edges = ws.json(&["table-lineage", "list", "--source", &orders]);
    let edge = edges[0]["id"].as_i64().expect("edge id").to_string();
    assert_eq!(edges[0]["relation_type"], "TRANSFORMATION");

    let updated = ws.json(&["table-lineage", "update", &edge, "--relation-type", "ETL"]);
    assert_eq!(updated["relation_type"], "ETL");
    assert_eq!(updated["target_table_id"].to_string(), summary);

    ws.cmd()
        .args(["table-lineage", "update", &edge])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to update"));
}

// ============================================================================
// Import and Config
// ============================================================================

#[test]
fn test_import_reports_failed_rows() {
    let ws = Workspace::initialized();
    ws.json(&["metadata", "add-source", "warehouse", "--type", "oracle"]);
    ws.json(&["metadata", "add-table", "warehouse", "orders"]);
    ws.json(&["metadata", "add-table", "warehouse", "order_summary"]);

    let file = ws.dir.path().join("lineage.json");
    std::fs::write(
        &file,
        r#"{"lineages": [
            {"sources": [{"data_source": "warehouse", "table": "orders"}],
             "target": {"data_source": "warehouse", "table": "order_summary"}},
            {"sources": [{"data_source": "warehouse", "table": "ghost"}],
             "target": {"data_source": "warehouse", "table": "order_summary"}}
        ]}"#,
    )
    .unwrap();
    let path = file.display().to_string();

    let report = ws.json(&["import", &path]);
    assert_eq!(report["created"], 1);
    assert_eq!(report["errors"][0]["row"], 2);

    ws.cmd()
        .args(["import", &path, "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 import row(s) failed"));
}

#[test]
fn test_local_config_sets_default_relation_type() {
    let ws = Workspace::initialized();
    std::fs::write(
        ws.dir.path().join(".lineage/config.toml"),
        "[lineage]\ndefault_relation_type = \"ETL\"\n",
    )
    .unwrap();

    let config = ws.json(&["config", "show"]);
    assert_eq!(config["lineage"]["default_relation_type"], "ETL");

    let (orders, _, _) = seed_chain(&ws);
    let edges = ws.json(&["table-lineage", "list", "--source", &orders]);
    assert_eq!(edges[0]["relation_type"], "ETL");
}

#[test]
fn test_invalid_config_rejected() {
    let ws = Workspace::initialized();
    std::fs::write(
        ws.dir.path().join(".lineage/config.toml"),
        "[graph]\nmax_depth = 40\n",
    )
    .unwrap();

    ws.cmd()
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("graph.max_depth"));
}
