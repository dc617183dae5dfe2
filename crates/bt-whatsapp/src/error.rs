//! Error types for bt-whatsapp

use bt_core::ErrorKind;
use thiserror::Error;

/// bt-whatsapp error type
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("Twilio credentials not set")]
    CredentialsNotSet,

    #[error("Webhook signature verification failed")]
    SignatureVerificationFailed,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Twilio API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] bt_core::Error),
}

impl WhatsAppError {
    /// The user-facing message category for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            WhatsAppError::Api { .. } | WhatsAppError::Http(_) | WhatsAppError::CredentialsNotSet => {
                ErrorKind::Twilio
            }
            WhatsAppError::Timeout(_) => ErrorKind::Timeout,
            WhatsAppError::InvalidPayload(_) => ErrorKind::Validation,
            WhatsAppError::TemplateNotFound(_) => ErrorKind::NotFound,
            WhatsAppError::Core(e) => e.kind(),
            _ => ErrorKind::General,
        }
    }
}

impl From<reqwest::Error> for WhatsAppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            WhatsAppError::Timeout(err.to_string())
        } else {
            WhatsAppError::Http(err.to_string())
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let api = WhatsAppError::Api {
            status: 400,
            message: "bad".into(),
        };
        assert_eq!(api.kind(), ErrorKind::Twilio);
        assert_eq!(
            WhatsAppError::TemplateNotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            WhatsAppError::Core(bt_core::Error::LockPoisoned).kind(),
            ErrorKind::Database
        );
        assert_eq!(api.to_string(), "Twilio API error: 400 - bad");
    }
}
