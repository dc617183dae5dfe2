//! Error types for bt-core

use std::fmt;

use thiserror::Error;

/// Main error type for bt-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The user-facing message category for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Database(_) | Error::LockPoisoned => ErrorKind::Database,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Validation(_) => ErrorKind::Validation,
            _ => ErrorKind::General,
        }
    }
}

/// Result type alias for bt-core
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of failure that map to a canned message for the WhatsApp user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorKind {
    #[default]
    General,
    Timeout,
    Validation,
    NotFound,
    Twilio,
    Database,
}

impl ErrorKind {
    /// Parse the short name used in logs and config (`"timeout"`, `"not_found"`, ...).
    /// Unknown names fall back to [`ErrorKind::General`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "timeout" => ErrorKind::Timeout,
            "validation" => ErrorKind::Validation,
            "not_found" => ErrorKind::NotFound,
            "twilio" => ErrorKind::Twilio,
            "database" => ErrorKind::Database,
            _ => ErrorKind::General,
        }
    }

    /// Message shown to the customer
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::General => {
                "Lo siento, ocurrió un error al procesar tu solicitud. Por favor, intenta nuevamente más tarde."
            }
            ErrorKind::Timeout => {
                "Lo siento, la operación está tomando más tiempo del esperado. Por favor, intenta nuevamente más tarde."
            }
            ErrorKind::Validation => {
                "La información proporcionada no es válida. Por favor, verifica e intenta nuevamente."
            }
            ErrorKind::NotFound => {
                "No se encontró la información solicitada. Por favor, verifica e intenta nuevamente."
            }
            ErrorKind::Twilio => {
                "Estamos experimentando problemas de comunicación. Por favor, intenta nuevamente más tarde."
            }
            ErrorKind::Database => {
                "Estamos experimentando problemas con nuestra base de datos. Por favor, intenta nuevamente más tarde."
            }
        }
    }
}

/// Log an error together with the request context it happened in.
///
/// The full `source()` chain is included so the log line carries the root cause.
pub fn log_error<E>(error: &E, context: &[(&str, &dyn fmt::Display)])
where
    E: std::error::Error + ?Sized,
{
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }

    let context = context
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(", ");

    if context.is_empty() {
        tracing::error!("Error: {}", chain);
    } else {
        tracing::error!("Error: {} (context: {})", chain, context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_from_name() {
        assert_eq!(ErrorKind::from_name("timeout"), ErrorKind::Timeout);
        assert_eq!(ErrorKind::from_name("twilio"), ErrorKind::Twilio);
        assert_eq!(ErrorKind::from_name("whatever"), ErrorKind::General);
    }

    #[test]
    fn test_general_message_matches_default() {
        assert_eq!(
            ErrorKind::default().user_message(),
            ErrorKind::General.user_message()
        );
        assert!(ErrorKind::Database.user_message().contains("base de datos"));
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(Error::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(Error::LockPoisoned.kind(), ErrorKind::Database);
        assert_eq!(Error::Other("boom".into()).kind(), ErrorKind::General);
    }
}
