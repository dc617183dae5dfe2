//! bt-testkit: logging assertion harness and suite runner
//!
//! [`LoggedCase`] wraps each assertion with a `CHECK:` line before and a
//! `RESULT:` line after. [`SuiteRunner`] runs suites case by case, prints a
//! summary and turns the outcome into a process exit code.

pub mod error;
pub mod logged;
pub mod runner;
pub mod suites;

pub use error::{Result, TestkitError};
pub use logged::{Container, LoggedCase, log_header};
pub use runner::{CaseResult, RunSummary, Suite, SuiteResult, SuiteRunner, TestCase};
