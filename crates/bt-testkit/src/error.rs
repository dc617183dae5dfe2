//! Error types for bt-testkit

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestkitError {
    /// Returned by a case to mark itself skipped
    #[error("Skipped: {0}")]
    Skipped(String),

    #[error("Unknown suite: {0}")]
    UnknownSuite(String),

    #[error("No tests directory in {0}")]
    NoTestsDir(PathBuf),

    #[error("Failed to run cargo: {0}")]
    Cargo(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] bt_core::Error),

    #[error("WhatsApp error: {0}")]
    WhatsApp(#[from] bt_whatsapp::WhatsAppError),
}

pub type Result<T> = std::result::Result<T, TestkitError>;
