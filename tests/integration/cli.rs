//! Tests for the `pkgsolve` binary.

use crate::common::TestProject;
use predicates::prelude::*;

#[test]
fn test_resolve_prints_packages() {
    let project = TestProject::new().unwrap();
    project
        .resolve()
        .args(["pyfoo", "!python-2.6.8"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Resolved 2 package(s)"))
        .stdout(predicate::str::contains("  python-2.6.0\n  pyfoo-3.1.0\n"));
}

#[test]
fn test_resolve_failure_exits_with_error() {
    let project = TestProject::new().unwrap();
    project
        .resolve()
        .args(["pyfoo-3.1", "python-2.7+"])
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("Resolve failed (failed)"))
        .stdout(predicate::str::contains("The following package conflicts occurred"))
        .stderr(predicate::str::contains("error: Resolve failed after 1 step(s)"));
}

#[test]
fn test_resolve_json() {
    let project = TestProject::new().unwrap();
    let output = project.resolve().args(["--json", "pyvariants", "python"]).output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["result"], "solved");
    assert_eq!(value["packages"][0]["name"], "python");
    assert_eq!(value["packages"][0]["version"], "2.7.0");
    assert_eq!(value["packages"][1]["name"], "pyvariants");
    assert_eq!(value["packages"][1]["index"], 0);
}

#[test]
fn test_resolve_json_failure() {
    let project = TestProject::new().unwrap();
    let output = project.resolve().args(["--json", "pymum-1"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["result"], "failed");
    assert_eq!(value["status"], "failed");
    assert!(value["description"].as_str().unwrap().starts_with("A cyclic dependency was detected"));
}

#[test]
fn test_resolve_with_config_and_max_fails() {
    let project = TestProject::new().unwrap();
    let config = project
        .write_file(
            "solver.toml",
            r#"
            [[package_orderers]]
            type = "version_split"
            packages = ["python"]
            first_version = "2.6.0"
            "#,
        )
        .unwrap();

    project
        .resolve()
        .arg("--config")
        .arg(&config)
        .arg("python")
        .assert()
        .success()
        .stdout(predicate::str::contains("python-2.6.0"));

    project
        .resolve()
        .args(["--max-fails", "1", "python", "bahish", "pybah"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("fail limit reached"));
}

#[test]
fn test_resolve_writes_graph() {
    let project = TestProject::new().unwrap();
    let graph = project.project_path().join("failure.dot");

    project.resolve().arg("--graph").arg(&graph).args(["pybah", "!python"]).assert().failure();

    let dot = std::fs::read_to_string(&graph).unwrap();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("!python"));
}

#[test]
fn test_resolve_unknown_family() {
    let project = TestProject::new().unwrap();
    project
        .resolve()
        .arg("pyhton")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pyhton"))
        .stderr(predicate::str::contains("python"));
}

#[test]
fn test_resolve_bad_inputs() {
    let project = TestProject::new().unwrap();
    project.resolve().arg("python-3..1").assert().failure().stderr(predicate::str::contains("3..1"));

    project
        .pkgsolve()
        .args(["resolve", "--repo", "missing.toml", "python"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.toml"));

    project.resolve().assert().failure().code(2);
}

#[test]
fn test_range_command() {
    let project = TestProject::new().unwrap();
    project
        .pkgsolve()
        .args(["range", "6+|4", "4.2", "5", "7"])
        .assert()
        .success()
        .stdout("4|6+\n4.2  yes\n5    no\n7    yes\n");

    project.pkgsolve().args(["range", "3..1"]).assert().failure();
}

#[test]
fn test_verbose_logs_to_stderr() {
    let project = TestProject::new().unwrap();
    project
        .resolve()
        .args(["--verbose", "pyfoo"])
        .assert()
        .success()
        .stderr(predicate::str::contains("DEBUG"));

    project.resolve().args(["--quiet", "pyfoo"]).assert().success().stderr(predicate::str::is_empty());
}
