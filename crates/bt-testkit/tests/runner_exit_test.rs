//! Exit code contract of the `bt-test-runner` binary

use std::process::Command;

use bt_testkit::{CaseResult, LoggedCase, Suite, SuiteRunner};

fn runner() -> Command {
    Command::new(env!("CARGO_BIN_EXE_bt-test-runner"))
}

#[test]
fn test_all_passing_exits_zero_and_writes_log() {
    let logs = tempfile::tempdir().unwrap();
    let output = runner()
        .args(["--filter", "test_intent_detection", "--log-dir"])
        .arg(logs.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("STARTING TEST: test_products_request"));
    assert!(stdout.contains("All tests passed successfully!"));

    let logs: Vec<_> = std::fs::read_dir(logs.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("test_run_") && logs[0].ends_with(".log"));
}

#[test]
fn test_no_suites_exits_non_zero() {
    let logs = tempfile::tempdir().unwrap();
    let output = runner()
        .args(["--filter", "does_not_exist", "--log-dir"])
        .arg(logs.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("No test files found!"));
}

#[test]
fn test_unknown_argument_fails() {
    let output = runner().arg("--bogus").output().unwrap();
    assert!(!output.status.success());
}

fn failing_case(case: &LoggedCase) -> CaseResult {
    case.assert_in_with_log("pizza", "milanesa napolitana", "The menu has pizza", None);
    Ok(())
}

fn passing_case(case: &LoggedCase) -> CaseResult {
    case.assert_with_log(true, "Trivial check", None);
    Ok(())
}

#[test]
fn test_one_failure_fails_the_run() {
    let summary = SuiteRunner::new(vec![
        Suite::new("test_good").case("test_passing", passing_case),
        Suite::new("test_bad")
            .case("test_failing", failing_case)
            .case("test_passing", passing_case),
    ])
    .run();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.exit_code(), 1);
    assert!(summary.details["test_bad"].failures_detail[0].contains("The menu has pizza"));
}

#[test]
fn test_builtin_suites_pass() {
    let summary = SuiteRunner::new(bt_testkit::suites::all()).run();
    assert_eq!(summary.failed, 0, "{:?}", summary.details);
    assert_eq!(summary.errors, 0, "{:?}", summary.details);
    assert_eq!(summary.exit_code(), 0);
}
