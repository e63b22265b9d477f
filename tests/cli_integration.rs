//! CLI Integration Tests
//!
//! Tests the command-line interface end-to-end. Child processes get piped
//! stdin, so every run here takes the non-interactive path.

use assert_cmd::Command;
use assert_fs::prelude::*;
use predicates::prelude::*;

const INIT_WORKFLOW: &str = r#"
id: init
command: new
description: Create a project
steps:
  - id: name
    name: Project name
    prompt: What is the project called?
    validator: pattern
    pattern: "^[a-z][a-z0-9-]*$"
    example: my-project
    flag: --project-name
  - id: size
    name: Size
    prompt: How big is {{ name }}?
    required: false
    default: medium
    options:
      - key: small
      - key: medium
      - key: large
  - id: docker
    name: Docker
    prompt: Add a Dockerfile?
    kind: confirm
    required: false
    default: "no"
"#;

/// Get the binary to test.
fn guidepost() -> Command {
    let mut cmd = Command::cargo_bin("guidepost").unwrap();
    cmd.env_remove("GUIDEPOST_NON_INTERACTIVE").env_remove("GUIDEPOST_STATE_DIR");
    cmd
}

/// A project directory with one workflow and an isolated state directory.
fn project() -> assert_fs::TempDir {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child(".guidepost/workflows/init.yaml").write_str(INIT_WORKFLOW).unwrap();
    temp
}

fn guidepost_in(temp: &assert_fs::TempDir) -> Command {
    let mut cmd = guidepost();
    cmd.current_dir(temp.path()).arg("--state-dir").arg(temp.path().join("state"));
    cmd
}

// ============================================================================
// Help & Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    guidepost()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Guided, resumable"));
}

#[test]
fn test_version_flag() {
    guidepost()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_run_command_help() {
    guidepost()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--non-interactive"))
        .stdout(predicate::str::contains("--set"))
        .stdout(predicate::str::contains("--plain"));
}

#[test]
fn test_invalid_subcommand() {
    guidepost().arg("definitely-not-a-command").assert().failure();
}

// ============================================================================
// List & Validate Tests
// ============================================================================

#[test]
fn test_list_discovers_workflows() {
    let temp = project();

    guidepost_in(&temp)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("init (new)"))
        .stdout(predicate::str::contains("Total: 1 workflows"));
}

#[test]
fn test_list_with_json_output() {
    let temp = project();

    guidepost_in(&temp)
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("["))
        .stdout(predicate::str::contains("\"steps\": 3"));
}

#[test]
fn test_validate_workflow() {
    let temp = project();

    guidepost_in(&temp)
        .args(["validate", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("3. Docker [docker] (optional)"));
}

#[test]
fn test_validate_bundled_demo() {
    guidepost()
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args(["validate", "demos/new-project.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Workflow 'new-project' (new) is valid"));
}

#[test]
fn test_validate_rejects_optional_step_without_default() {
    let temp = assert_fs::TempDir::new().unwrap();
    let broken = temp.child("broken.yaml");
    broken
        .write_str("id: b\ncommand: c\nsteps:\n  - id: x\n    name: X\n    prompt: X?\n    required: false\n")
        .unwrap();

    guidepost_in(&temp).args(["validate", "broken.yaml"]).assert().failure();
}

#[test]
fn test_validate_unknown_workflow() {
    let temp = project();

    guidepost_in(&temp)
        .args(["validate", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

// ============================================================================
// Run Tests
// ============================================================================

#[test]
fn test_run_non_interactive_with_values() {
    let temp = project();

    guidepost_in(&temp)
        .args(["run", "init", "--non-interactive", "--set", "name=demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("name = demo"))
        .stdout(predicate::str::contains("size = medium (default)"))
        .stdout(predicate::str::contains("docker = false (default)"));

    temp.child("state").child("new_init.json").assert(predicate::path::missing());
}

#[test]
fn test_run_accepts_step_flag_name() {
    let temp = project();

    guidepost_in(&temp)
        .args(["run", "init", "-n", "--set", "project-name=demo", "--set", "size=large"])
        .assert()
        .success()
        .stdout(predicate::str::contains("name = demo"))
        .stdout(predicate::str::contains("size = large"));
}

#[test]
fn test_run_json_output() {
    let temp = project();

    let output = guidepost_in(&temp)
        .args(["run", "init", "-n", "--json", "--set", "name=demo", "--set", "docker=yes"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let values: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(values["name"], "demo");
    assert_eq!(values["size"], "medium");
    assert_eq!(values["docker"], "true");
}

#[test]
fn test_run_json_keeps_stdout_machine_readable() {
    let temp = project();

    let output = guidepost_in(&temp)
        .args(["run", "init", "--json", "--plain", "--set", "name=demo"])
        .write_stdin("")
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("Step 1 of"));
    assert!(!stdout.contains("completed"));
    let values: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(values["docker"], "false");
    assert_eq!(values.as_object().map(serde_json::Map::len), Some(3));
}

#[test]
fn test_run_missing_required_input_exits_2() {
    let temp = project();

    guidepost_in(&temp)
        .args(["run", "init", "--non-interactive"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Project name"));

    temp.child("state").child("new_init.json").assert(predicate::path::missing());
}

#[test]
fn test_run_rejects_invalid_value() {
    let temp = project();

    guidepost_in(&temp)
        .args(["run", "init", "-n", "--set", "name=Not Valid"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("my-project"));
}

#[test]
fn test_run_rejects_malformed_set() {
    let temp = project();

    guidepost_in(&temp)
        .args(["run", "init", "-n", "--set", "name"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn test_run_honours_environment_switch() {
    let temp = project();

    guidepost_in(&temp)
        .env("GUIDEPOST_NON_INTERACTIVE", "true")
        .args(["run", "init"])
        .assert()
        .code(2);
}

// ============================================================================
// State Tests
// ============================================================================

#[test]
fn test_state_list_empty() {
    let temp = project();

    guidepost_in(&temp)
        .args(["state", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved workflow state"));
}

#[test]
fn test_state_list_and_clear() {
    let temp = project();
    let state = r#"{
  "version": 1,
  "id": "init-new",
  "workflow_id": "init",
  "command_name": "new",
  "current_step_index": 1,
  "status": "interrupted",
  "created_at": "2026-10-17T08:00:00Z",
  "updated_at": "2026-10-17T08:05:00Z",
  "step_ids": ["name", "size", "docker"],
  "responses": {
    "name": {"step_id": "name", "value": "demo", "skipped": false, "responded_at": "2026-10-17T08:05:00Z"}
  }
}"#;
    temp.child("state/new_init.json").write_str(state).unwrap();
    temp.child("state/garbage.json").write_str("{{{").unwrap();

    guidepost_in(&temp)
        .args(["state", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("new (init) - interrupted, step 2 of 3"))
        .stdout(predicate::str::contains("unreadable"));

    guidepost_in(&temp)
        .args(["state", "clear", "new"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1"));

    temp.child("state/new_init.json").assert(predicate::path::missing());
    temp.child("state/garbage.json").assert(predicate::path::exists());
}

#[test]
fn test_state_clear_requires_target() {
    let temp = project();

    guidepost_in(&temp).args(["state", "clear"]).assert().failure();
}

#[test]
fn test_state_gc() {
    let temp = project();

    guidepost_in(&temp)
        .args(["state", "gc", "--days", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("older than 3 days"));
}

// ============================================================================
// Config & Completions Tests
// ============================================================================

#[test]
fn test_config_shows_state_dir() {
    let temp = project();

    guidepost_in(&temp)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("retention_days"))
        .stdout(predicate::str::contains("state directory"))
        .stdout(predicate::str::contains("# themes: default, nord, mono"));
}

#[test]
fn test_completions_bash() {
    guidepost()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("guidepost"));
}
