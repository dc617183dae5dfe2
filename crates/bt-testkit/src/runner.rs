//! Sequential suite runner with a coloured summary and a process exit code

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;

use chrono::{DateTime, Local};
use nu_ansi_term::Color;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TestkitError};
use crate::logged::{LoggedCase, log_header};

/// What a case body returns; an `Err` counts as an error, not a failure
pub type CaseResult = anyhow::Result<()>;

/// A single named case
#[derive(Clone, Copy)]
pub struct TestCase {
    pub name: &'static str,
    pub run: fn(&LoggedCase) -> CaseResult,
}

/// A named group of cases, run in order
#[derive(Clone)]
pub struct Suite {
    pub name: &'static str,
    pub cases: Vec<TestCase>,
}

impl Suite {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cases: Vec::new(),
        }
    }

    pub fn case(mut self, name: &'static str, run: fn(&LoggedCase) -> CaseResult) -> Self {
        self.cases.push(TestCase { name, run });
        self
    }
}

/// Counts for one suite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub failures_detail: Vec<String>,
    pub errors_detail: Vec<String>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.errors == 0
    }
}

/// Aggregated counts for the whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub skipped: usize,
    pub details: BTreeMap<String, SuiteResult>,
    /// Set when discovery found nothing to run
    pub nothing_found: bool,
}

impl RunSummary {
    fn add(&mut self, suite: &str, result: SuiteResult) {
        info!(
            "Test results for {}: Total={}, Passed={}, Failed={}, Errors={}, Skipped={}",
            suite, result.total, result.passed, result.failed, result.errors, result.skipped
        );
        self.total += result.total;
        self.passed += result.passed;
        self.failed += result.failed;
        self.errors += result.errors;
        self.skipped += result.skipped;
        self.details.insert(suite.to_string(), result);
    }

    pub fn success(&self) -> bool {
        !self.nothing_found && self.failed == 0 && self.errors == 0
    }

    /// 0 when every case passed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        if self.success() { 0 } else { 1 }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.passed as f64 / self.total as f64
        }
    }

    pub fn print(&self, log_file: Option<&Path>) {
        println!("{}", Color::Green.bold().paint("\n\n===== TEST SUMMARY ====="));
        println!("Total Tests Run: {}", self.total);
        println!("{}", Color::Green.paint(format!("Passed: {}", self.passed)));
        print_count("Failed", self.failed, Color::Red);
        print_count("Errors", self.errors, Color::Red);
        print_count("Skipped", self.skipped, Color::Yellow);
        println!("Success Rate: {:.2}%", self.success_rate());

        let mut has_issues = false;
        for (suite, result) in &self.details {
            if result.success() {
                continue;
            }
            has_issues = true;
            println!("{}", Color::Red.paint(format!("\nIssues in {}:", suite)));
            if result.failed > 0 {
                println!("{}", Color::Red.paint("Failures:"));
                for failure in &result.failures_detail {
                    println!("  - {}", failure);
                }
            }
            if result.errors > 0 {
                println!("{}", Color::Red.paint("Errors:"));
                for err in &result.errors_detail {
                    println!("  - {}", err);
                }
            }
        }

        if !has_issues && self.total > 0 {
            println!("{}", Color::Green.bold().paint("\nAll tests passed successfully!"));
        }
        if let Some(path) = log_file {
            println!(
                "{}",
                Color::Blue.paint(format!("\nFull test log available at: {}", path.display()))
            );
        }
    }
}

fn print_count(label: &str, count: usize, color: Color) {
    let line = format!("{}: {}", label, count);
    if count > 0 {
        println!("{}", color.paint(line));
    } else {
        println!("{}", line);
    }
}

/// `logs/test_run_YYYYmmdd_HHMMSS.log` under `dir`
pub fn log_file_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    dir.join(format!("test_run_{}.log", now.format("%Y%m%d_%H%M%S")))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "panic".to_string()
    }
}

/// Runs registered suites, or the integration test targets of a crate
pub struct SuiteRunner {
    suites: Vec<Suite>,
    filter: Option<String>,
}

impl SuiteRunner {
    pub fn new(suites: Vec<Suite>) -> Self {
        Self {
            suites,
            filter: None,
        }
    }

    /// Only run suites whose name contains `filter`
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter.filter(|f| !f.is_empty());
        self
    }

    fn selected(&self) -> Vec<&Suite> {
        self.suites
            .iter()
            .filter(|s| match &self.filter {
                Some(f) => s.name.contains(f.as_str()),
                None => true,
            })
            .collect()
    }

    /// Run every selected suite in order
    pub fn run(&self) -> RunSummary {
        info!("Starting test run");
        println!(
            "{}",
            Color::Yellow.bold().paint("\n==== BREADERS WHATSAPP BOT TEST SUITE ====")
        );

        let mut summary = RunSummary::default();
        let suites = self.selected();
        if suites.is_empty() {
            warn!("No test files found!");
            println!("{}", Color::Red.paint("No test files found!"));
            summary.nothing_found = true;
            return summary;
        }

        let names: Vec<&str> = suites.iter().map(|s| s.name).collect();
        info!("Found {} test suites: {}", suites.len(), names.join(", "));

        for suite in suites {
            let result = run_suite(suite);
            summary.add(suite.name, result);
        }
        summary
    }

    /// Run `cargo test --test <target>` for every `tests/test_*.rs` or
    /// `tests/*_test.rs` file of the crate at `crate_dir`
    pub fn run_cargo(&self, crate_dir: &Path) -> Result<RunSummary> {
        info!("Starting test run");
        let mut targets = discover_test_targets(crate_dir)?;
        if let Some(filter) = &self.filter {
            targets.retain(|t| t.contains(filter.as_str()));
        }

        let mut summary = RunSummary::default();
        if targets.is_empty() {
            warn!("No test files found!");
            println!("{}", Color::Red.paint("No test files found!"));
            summary.nothing_found = true;
            return Ok(summary);
        }
        info!("Found {} test files: {}", targets.len(), targets.join(", "));

        for target in &targets {
            let result = match run_cargo_target(crate_dir, target) {
                Ok(result) => result,
                Err(e) => {
                    let msg = format!("Error running test module {}: {}", target, e);
                    error!("{}", msg);
                    SuiteResult {
                        errors: 1,
                        errors_detail: vec![msg],
                        ..Default::default()
                    }
                }
            };
            summary.add(target, result);
        }
        Ok(summary)
    }
}

fn module_banner(name: &str) {
    let rule = "=".repeat(60);
    info!("Running test module: {}", name);
    println!("{}", Color::Cyan.paint(format!("\n{}", rule)));
    println!("{}", Color::Cyan.bold().paint(format!(" TEST MODULE: {}", name)));
    println!("{}", Color::Cyan.paint(rule));
}

/// Run the cases of one suite, each isolated with `catch_unwind`
pub fn run_suite(suite: &Suite) -> SuiteResult {
    module_banner(suite.name);
    log_header(&format!("Setting up {}", suite.name));

    let mut result = SuiteResult::default();
    for case in &suite.cases {
        result.total += 1;
        let id = format!("{}::{}", suite.name, case.name);

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let logged = LoggedCase::start(case.name);
            (case.run)(&logged)
        }));

        match outcome {
            Ok(Ok(())) => result.passed += 1,
            Ok(Err(e)) => match e.downcast_ref::<TestkitError>() {
                Some(TestkitError::Skipped(reason)) => {
                    info!("Skipped {}: {}", id, reason);
                    result.skipped += 1;
                }
                _ => {
                    error!("Error in {}: {:#}", id, e);
                    result.errors += 1;
                    result.errors_detail.push(format!("{}: {:#}", id, e));
                }
            },
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("Failure in {}: {}", id, message);
                result.failed += 1;
                result.failures_detail.push(format!("{}: {}", id, message));
            }
        }
    }

    log_header(&format!("Tearing down {}", suite.name));
    result
}

/// Integration test target names under `<crate_dir>/tests`, sorted
pub fn discover_test_targets(crate_dir: &Path) -> Result<Vec<String>> {
    info!("Discovering test files...");
    let tests_dir = crate_dir.join("tests");
    if !tests_dir.is_dir() {
        return Err(TestkitError::NoTestsDir(crate_dir.to_path_buf()));
    }

    let mut targets = Vec::new();
    for entry in std::fs::read_dir(&tests_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("rs") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.starts_with("test_") || stem.ends_with("_test") {
            debug!("Discovered test file: {}", path.display());
            targets.push(stem.to_string());
        }
    }
    targets.sort();
    Ok(targets)
}

static CARGO_RESULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"test result: \w+\. (\d+) passed; (\d+) failed; (\d+) ignored")
        .expect("valid regex")
});

static CARGO_FAILED_TEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^test (\S+) \.\.\. FAILED$").expect("valid regex"));

/// Turn the libtest output of one target into counts
pub fn parse_cargo_output(output: &str) -> SuiteResult {
    let mut result = SuiteResult::default();
    for caps in CARGO_RESULT.captures_iter(output) {
        let count = |i: usize| caps[i].parse::<usize>().unwrap_or(0);
        result.passed += count(1);
        result.failed += count(2);
        result.skipped += count(3);
    }
    result.total = result.passed + result.failed + result.skipped;
    result.failures_detail = CARGO_FAILED_TEST
        .captures_iter(output)
        .map(|caps| caps[1].to_string())
        .collect();
    result
}

fn run_cargo_target(crate_dir: &Path, target: &str) -> Result<SuiteResult> {
    module_banner(target);
    let output = Command::new("cargo")
        .args(["test", "--test", target])
        .current_dir(crate_dir)
        .output()
        .map_err(|e| TestkitError::Cargo(e.to_string()))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    print!("{}", stdout);

    let mut result = parse_cargo_output(&stdout);
    if !output.status.success() && result.success() {
        // Build failures never reach the libtest summary
        result.errors += 1;
        result.errors_detail.push(format!(
            "{}: {}",
            target,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn passes(case: &LoggedCase) -> CaseResult {
        case.assert_with_log(true, "always true", None);
        Ok(())
    }

    fn fails(case: &LoggedCase) -> CaseResult {
        case.assert_equal_with_log(1, 2, "one is two", None);
        Ok(())
    }

    fn errors(_case: &LoggedCase) -> CaseResult {
        anyhow::bail!("store unavailable")
    }

    fn skips(_case: &LoggedCase) -> CaseResult {
        Err(TestkitError::Skipped("no credentials".into()).into())
    }

    #[test]
    fn test_counts_per_outcome() {
        let suite = Suite::new("mixed")
            .case("passes", passes)
            .case("fails", fails)
            .case("errors", errors)
            .case("skips", skips);

        let result = run_suite(&suite);
        assert_eq!(result.total, 4);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors, 1);
        assert_eq!(result.skipped, 1);
        assert!(result.failures_detail[0].starts_with("mixed::fails: assertion"));
        assert_eq!(result.errors_detail[0], "mixed::errors: store unavailable");
    }

    #[test]
    fn test_exit_codes() {
        let ok = SuiteRunner::new(vec![Suite::new("ok").case("passes", passes)]).run();
        assert_eq!(ok.exit_code(), 0);
        assert_eq!(ok.success_rate(), 100.0);

        let bad = SuiteRunner::new(vec![
            Suite::new("ok").case("passes", passes),
            Suite::new("bad").case("fails", fails),
        ])
        .run();
        assert_eq!(bad.exit_code(), 1);
        assert_eq!(bad.total, 2);
    }

    #[test]
    fn test_nothing_selected_fails() {
        let runner = SuiteRunner::new(vec![Suite::new("ok").case("passes", passes)])
            .with_filter(Some("missing".into()));
        let summary = runner.run();
        assert!(summary.nothing_found);
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_log_file_name() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            log_file_path(Path::new("logs"), now),
            PathBuf::from("logs/test_run_20240309_140507.log")
        );
    }

    #[test]
    fn test_discover_targets() {
        let dir = tempfile::tempdir().unwrap();
        let tests = dir.path().join("tests");
        std::fs::create_dir(&tests).unwrap();
        for name in ["test_intent.rs", "webhook_flow_test.rs", "helpers.rs", "test_notes.md"] {
            std::fs::write(tests.join(name), "").unwrap();
        }

        let targets = discover_test_targets(dir.path()).unwrap();
        assert_eq!(targets, vec!["test_intent", "webhook_flow_test"]);

        let empty = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover_test_targets(empty.path()),
            Err(TestkitError::NoTestsDir(_))
        ));
    }

    #[test]
    fn test_parse_cargo_output() {
        let output = "\
running 3 tests
test flows::greeting ... ok
test flows::handoff ... FAILED
test flows::slow ... ignored

test result: FAILED. 1 passed; 1 failed; 1 ignored; 0 measured; 0 filtered out; finished in 0.01s
";
        let result = parse_cargo_output(output);
        assert_eq!(result.total, 3);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.failures_detail, vec!["flows::handoff"]);
    }
}
