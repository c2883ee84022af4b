//! CLI end-to-end tests that invoke the compiled `agentkit` binary.

use assert_cmd::Command;
use predicates::prelude::*;

use agentkit_test_utils::{TestProject, Upstream};

fn agentkit(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("agentkit").unwrap();
    cmd.current_dir(project.root()).env_remove("AGENTKIT_CONFIG").env("NO_COLOR", "1");
    cmd
}

const LOCAL_CONFIG: &str = r#"
agents:
  - id: helper
    name: Helper
    plugins:
      - source: local
        path: plugins/echo
"#;

#[test]
fn help_exits_zero() {
    let project = TestProject::new();
    agentkit(&project)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sync"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn sync_installs_then_reports_unchanged() {
    let project = TestProject::new();
    project.native_plugin("plugins/echo", "echo");
    project.write_config(LOCAL_CONFIG);

    agentkit(&project)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("+ local/echo"))
        .stdout(predicate::str::contains("1 added"));
    project.assert_file_exists("agentkit.lock.json");

    agentkit(&project)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("· local/echo"))
        .stdout(predicate::str::contains("1 unchanged"));
}

#[test]
fn quiet_prints_only_the_summary() {
    let project = TestProject::new();
    project.native_plugin("plugins/echo", "echo");
    project.write_config(LOCAL_CONFIG);

    agentkit(&project)
        .args(["sync", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("local/echo").not())
        .stdout(predicate::str::contains("Sync complete"));
}

#[test]
fn failures_exit_zero_unless_strict() {
    let project = TestProject::new();
    project.write_config(
        "agents:\n  - id: helper\n    name: Helper\n    plugins:\n      - source: local\n        path: plugins/missing\n",
    );

    agentkit(&project)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("✗ local/missing"));

    agentkit(&project)
        .args(["sync", "--strict"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 plugin(s) failed"));
}

#[test]
fn unknown_agent_filter_fails() {
    let project = TestProject::new();
    project.native_plugin("plugins/echo", "echo");
    project.write_config(LOCAL_CONFIG);

    agentkit(&project)
        .args(["sync", "--agent", "nobody"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Agent not found: nobody"));
}

#[test]
fn invalid_declaration_leaves_no_lockfile() {
    let project = TestProject::new();
    project.write_config(
        "agents:\n  - id: helper\n    name: Helper\n    plugins:\n      - source: remote\n        url: acme/server\n        type: serverExtension\n",
    );

    agentkit(&project)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("server extensions require a command"));
    project.assert_file_not_exists("agentkit.lock.json");
}

#[test]
fn missing_config_is_reported() {
    let project = TestProject::new();

    agentkit(&project)
        .arg("sync")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn explicit_lockfile_path_is_used() {
    let project = TestProject::new();
    project.native_plugin("plugins/echo", "echo");
    project.write_config(LOCAL_CONFIG);

    agentkit(&project)
        .args(["sync", "--lockfile", "state/custom.lock.json"])
        .assert()
        .success();

    project.assert_file_exists("state/custom.lock.json");
    project.assert_file_not_exists("agentkit.lock.json");
}

#[test]
fn list_shows_synced_plugins() {
    let project = TestProject::new();
    project.native_plugin("plugins/echo", "echo");
    project.write_config(LOCAL_CONFIG);
    agentkit(&project).arg("sync").assert().success();

    agentkit(&project)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("helper:"))
        .stdout(predicate::str::contains("local/echo"));

    let output = agentkit(&project).args(["list", "--json"]).output().unwrap();
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["agentId"], "helper");
    assert_eq!(rows[0]["key"], "local/echo");
    assert_eq!(rows[0]["kind"], "standard");
}

#[test]
fn remote_plugin_syncs_from_upstream() {
    let project = TestProject::new();
    let upstream = Upstream::new(&project.path("upstream"), "acme", "agentkit-plugin-y");
    project.write_config(&format!(
        "agents:\n  - id: helper\n    name: Helper\n    plugins:\n      - source: github\n        url: {}\n        version: main\n",
        upstream.url()
    ));

    agentkit(&project)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("+ acme/y main"));

    upstream.advance("2");
    agentkit(&project)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("↻ acme/y"));
}

#[test]
fn agent_without_id_is_idempotent() {
    let project = TestProject::new();
    project.native_plugin("plugins/echo", "echo");
    project.write_config(
        "agents:\n  - name: Helper\n    plugins:\n      - source: local\n        path: plugins/echo\n",
    );

    agentkit(&project).arg("sync").assert().success();

    agentkit(&project)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "0 added, 0 updated, 1 unchanged, 0 removed, 0 failed",
        ));
}
