//! CLI surface checks.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn version_flag_reports_the_package_version() {
    Command::cargo_bin("mint")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn help_flag_describes_usage() {
    Command::cargo_bin("mint")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mint"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn piped_stdin_without_script_is_an_error() {
    Command::cargo_bin("mint")
        .unwrap()
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no script"));
}

#[test]
fn missing_script_file_is_reported() {
    Command::cargo_bin("mint")
        .unwrap()
        .arg("definitely-missing.mn")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn script_without_compiler_front_end_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("program.mn");
    std::fs::write(&script, "print 'hello'\n").unwrap();

    Command::cargo_bin("mint")
        .unwrap()
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("compiler"));
}
