mod common;

use assert_cmd::Command;
use common::{clean_document, main_link, node, policy_yaml};
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const BIN: &str = "flowmend";

fn write_fixture(dir: &TempDir, document: &Value) -> (PathBuf, PathBuf) {
    let document_path = dir.path().join("pipeline.json");
    let policy_path = dir.path().join("topology.yaml");
    fs::write(
        &document_path,
        serde_json::to_string_pretty(document).unwrap(),
    )
    .unwrap();
    fs::write(&policy_path, policy_yaml()).unwrap();
    (document_path, policy_path)
}

fn single_branch_document() -> Value {
    json!({
        "nodes": [
            node("n1", "WhatsApp Trigger", "n8n-nodes-base.whatsAppTrigger"),
            node("n2", "IF: Known User?", "n8n-nodes-base.if"),
            node("n3", "Send Reply", "n8n-nodes-base.httpRequest")
        ],
        "connections": {
            "WhatsApp Trigger": {"main": [[main_link("IF: Known User?")]]},
            "IF: Known User?": {"main": [[main_link("Send Reply")]]}
        }
    })
}

fn backups_in(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("pipeline_backup_"))
        })
        .collect()
}

#[test]
fn validate_clean_document_exits_zero() {
    let dir = TempDir::new().unwrap();
    let (document, policy) = write_fixture(&dir, &clean_document());
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["validate", document.to_str().unwrap()])
        .arg("--policy")
        .arg(&policy)
        .assert()
        .success()
        .stdout(predicate::str::contains("Findings (0):"));
}

#[test]
fn validate_broken_document_exits_one() {
    let dir = TempDir::new().unwrap();
    let (document, policy) = write_fixture(&dir, &single_branch_document());
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["validate", document.to_str().unwrap()])
        .arg("--policy")
        .arg(&policy)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FM-VAL-006"));
}

#[test]
fn validate_json_format_emits_machine_readable_report() {
    let dir = TempDir::new().unwrap();
    let (document, policy) = write_fixture(&dir, &clean_document());
    let output = Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["validate", document.to_str().unwrap(), "--format", "json"])
        .arg("--policy")
        .arg(&policy)
        .output()
        .expect("should run successfully");
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(report["stats"]["total_nodes"], json!(10));
    assert_eq!(report["findings"], json!([]));
}

#[test]
fn validate_missing_file_exits_two() {
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["validate", "/nonexistent/pipeline.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn validate_unparseable_document_exits_two() {
    let dir = TempDir::new().unwrap();
    let document = dir.path().join("pipeline.json");
    fs::write(&document, "{not json").unwrap();
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["validate", document.to_str().unwrap()])
        .assert()
        .code(2);
}

#[test]
fn validate_bad_policy_exits_two() {
    let dir = TempDir::new().unwrap();
    let (document, _) = write_fixture(&dir, &clean_document());
    let policy = dir.path().join("bad.yaml");
    fs::write(&policy, "version: \"99\"\n").unwrap();
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["validate", document.to_str().unwrap()])
        .arg("--policy")
        .arg(&policy)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("policy"));
}

#[test]
fn repair_writes_backup_then_document() {
    let dir = TempDir::new().unwrap();
    let (document, policy) = write_fixture(&dir, &single_branch_document());
    let original = fs::read_to_string(&document).unwrap();

    Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["repair", document.to_str().unwrap()])
        .arg("--policy")
        .arg(&policy)
        .assert()
        .success()
        .stderr(predicate::str::contains("backup written to"));

    let backups = backups_in(dir.path());
    assert_eq!(backups.len(), 1, "exactly one backup expected");
    assert_eq!(fs::read_to_string(&backups[0]).unwrap(), original);

    let repaired: Value =
        serde_json::from_str(&fs::read_to_string(&document).unwrap()).unwrap();
    assert_eq!(
        repaired["connections"]["IF: Known User?"]["main"][1][0]["node"],
        json!("Send Reply")
    );
}

#[test]
fn repair_dry_run_leaves_document_untouched() {
    let dir = TempDir::new().unwrap();
    let (document, policy) = write_fixture(&dir, &single_branch_document());
    let original = fs::read_to_string(&document).unwrap();

    Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["repair", document.to_str().unwrap(), "--dry-run"])
        .arg("--policy")
        .arg(&policy)
        .assert()
        .success()
        .stdout(predicate::str::contains("add edge"));

    assert_eq!(fs::read_to_string(&document).unwrap(), original);
    assert!(backups_in(dir.path()).is_empty());
}

#[test]
fn repair_unresolved_exits_one_without_writing() {
    // An orphan tool with no topology template cannot be fixed.
    let mut broken = clean_document();
    broken["nodes"]
        .as_array_mut()
        .unwrap()
        .push(node("n11", "execute_checkout", "@n8n/n8n-nodes-langchain.toolCode"));

    let dir = TempDir::new().unwrap();
    let (document, policy) = write_fixture(&dir, &broken);
    let original = fs::read_to_string(&document).unwrap();

    Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["repair", document.to_str().unwrap()])
        .arg("--policy")
        .arg(&policy)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("FM-VAL-002"));

    assert_eq!(fs::read_to_string(&document).unwrap(), original);
    assert!(backups_in(dir.path()).is_empty());
}

#[test]
fn repair_clean_document_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let (document, policy) = write_fixture(&dir, &clean_document());
    let original = fs::read_to_string(&document).unwrap();

    Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["repair", document.to_str().unwrap()])
        .arg("--policy")
        .arg(&policy)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(&document).unwrap(), original);
    assert!(backups_in(dir.path()).is_empty());
}

#[test]
fn help_lists_pipeline_commands() {
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("PIPELINE COMMANDS"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("repair"));
}

#[test]
fn invalid_max_passes_exits_two() {
    let dir = TempDir::new().unwrap();
    let (document, policy) = write_fixture(&dir, &single_branch_document());
    Command::cargo_bin(BIN)
        .expect("binary should build")
        .args(["repair", document.to_str().unwrap(), "--max-passes", "0"])
        .arg("--policy")
        .arg(&policy)
        .assert()
        .code(2);
}
