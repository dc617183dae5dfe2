//! bt-test-runner: run the bot's test suites and exit non-zero on any failure
//!
//! Usage:
//!   bt-test-runner                    - Run every built-in suite
//!   bt-test-runner --filter <name>    - Run suites whose name contains <name>
//!   bt-test-runner --cargo <dir>      - Run the integration test targets of a crate
//!   bt-test-runner --log-dir <dir>    - Write the run log under <dir> (default: logs)

use std::path::PathBuf;
use std::sync::Mutex;

use bt_testkit::{SuiteRunner, suites};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

struct Args {
    filter: Option<String>,
    cargo_dir: Option<PathBuf>,
    log_dir: PathBuf,
    help: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        filter: None,
        cargo_dir: None,
        log_dir: PathBuf::from("logs"),
        help: false,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .ok_or_else(|| anyhow::anyhow!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--filter" | "-f" => args.filter = Some(value("--filter")?),
            "--cargo" => args.cargo_dir = Some(PathBuf::from(value("--cargo")?)),
            "--log-dir" => args.log_dir = PathBuf::from(value("--log-dir")?),
            "--help" | "-h" => args.help = true,
            other => anyhow::bail!("Unknown argument: {}", other),
        }
    }
    Ok(args)
}

fn print_help() {
    println!("bt-test-runner - Breaders WhatsApp bot test runner");
    println!();
    println!("Usage:");
    println!("  bt-test-runner                   Run every built-in suite");
    println!("  bt-test-runner --filter <name>   Only suites whose name contains <name>");
    println!("  bt-test-runner --cargo <dir>     Run tests/test_*.rs and tests/*_test.rs of a crate");
    println!("  bt-test-runner --log-dir <dir>   Directory for the run log (default: logs)");
    println!();
    println!("Exit code is 0 when every test passes, 1 otherwise.");
}

fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    if args.help {
        print_help();
        return Ok(());
    }

    dotenvy::dotenv().ok();

    std::fs::create_dir_all(&args.log_dir)?;
    let log_path = bt_testkit::runner::log_file_path(&args.log_dir, chrono::Local::now());
    let log_file = std::fs::File::create(&log_path)?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(Mutex::new(log_file))
                .with_ansi(false)
                .with_filter(LevelFilter::INFO),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(EnvFilter::from_default_env().add_directive("warn".parse()?)),
        )
        .init();

    let runner = SuiteRunner::new(suites::all()).with_filter(args.filter);
    let summary = match &args.cargo_dir {
        Some(dir) => runner.run_cargo(dir)?,
        None => runner.run(),
    };
    summary.print(Some(&log_path));

    std::process::exit(summary.exit_code());
}
