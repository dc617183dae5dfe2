//! Twilio AI Assistant client

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::Formatter;
use tracing::{debug, error, info, warn};

use bt_core::TwilioConfig;
use bt_core::constants::{
    ASSISTANT_CONNECTION_MESSAGE, ASSISTANT_FAILED_MESSAGE, ASSISTANT_UNAVAILABLE_MESSAGE,
    ASSISTANT_UNEXPECTED_MESSAGE, GREETING_KEYWORDS, WELCOME_MESSAGE,
};

use crate::error::{Result, WhatsAppError};

const ASSISTANT_TIMEOUT: Duration = Duration::from_secs(10);

/// First messages shorter than this are treated as greetings
const SHORT_MESSAGE_CHARS: usize = 10;

/// Detected intent handed to the assistant alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AssistantContext {
    pub intent: &'static str,
    pub confidence: f64,
}

impl AssistantContext {
    /// JSON with `", "` and `": "` separators, fields in declaration order
    pub fn to_identity_json(&self) -> Result<String> {
        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
        self.serialize(&mut ser)
            .map_err(|e| WhatsAppError::InvalidPayload(e.to_string()))?;
        String::from_utf8(out).map_err(|e| WhatsAppError::InvalidPayload(e.to_string()))
    }
}

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// A conversational assistant that always yields some text for the user
#[async_trait]
pub trait AssistantApi: Send + Sync {
    async fn send_to_ai_assistant(
        &self,
        message: &str,
        from: &str,
        context: Option<&AssistantContext>,
        first_interaction: bool,
    ) -> String;
}

/// Client for the Twilio AI Assistants API
#[derive(Debug, Clone)]
pub struct TwilioAssistant {
    client: Client,
    account_sid: String,
    auth_token: String,
    assistant_id: Option<String>,
    webhook_url: Option<String>,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct AssistantPayload<'a> {
    identity: String,
    session_id: String,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    webhook: Option<&'a str>,
}

impl TwilioAssistant {
    pub fn from_config(config: &TwilioConfig) -> Self {
        let client = match Client::builder().timeout(ASSISTANT_TIMEOUT).build() {
            Ok(client) => client,
            Err(e) => {
                warn!("Failed to build the assistant HTTP client, requests have no timeout: {}", e);
                Client::new()
            }
        };
        Self {
            client,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            assistant_id: config.assistant_id.clone().filter(|id| !id.is_empty()),
            webhook_url: config.assistant_webhook_url.clone().filter(|url| !url.is_empty()),
            base_url: config.assistant_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn call_api(
        &self,
        assistant_id: &str,
        message: &str,
        from: &str,
        context: Option<&AssistantContext>,
    ) -> Result<String> {
        let clean_phone = session_key(from);
        let identity = match context {
            Some(context) => format!("phone:{}|context:{}", clean_phone, context.to_identity_json()?),
            None => format!("phone:{}", clean_phone),
        };
        let payload = AssistantPayload {
            identity,
            session_id: format!("session_{}", clean_phone),
            body: message,
            webhook: self.webhook_url.as_deref(),
        };

        info!("Sending message to Twilio Assistant: {}...", preview(message));
        let url = format!("{}/v1/Assistants/{}/Messages", self.base_url, assistant_id);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .json(&payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 && status != 201 {
            let text = response.text().await.unwrap_or_default();
            return Err(WhatsAppError::Api {
                status,
                message: text,
            });
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| WhatsAppError::InvalidPayload(e.to_string()))?;
        debug!("Twilio Assistant API response: {}", result);

        let reply = extract_reply(&result).ok_or_else(|| {
            WhatsAppError::InvalidPayload("assistant response has no text".to_string())
        })?;
        info!("Twilio Assistant response received: {}...", preview(&reply));
        Ok(reply)
    }
}

#[async_trait]
impl AssistantApi for TwilioAssistant {
    async fn send_to_ai_assistant(
        &self,
        message: &str,
        from: &str,
        context: Option<&AssistantContext>,
        first_interaction: bool,
    ) -> String {
        if first_interaction {
            if is_simple_greeting(message) {
                info!(
                    "First interaction with {} is a greeting, sending welcome message",
                    from
                );
                return WELCOME_MESSAGE.to_string();
            }
            info!("First interaction with {}, but not a simple greeting", from);
        }

        let Some(assistant_id) = self.assistant_id.as_deref() else {
            error!("TWILIO_ASSISTANT_ID is not configured");
            return ASSISTANT_UNAVAILABLE_MESSAGE.to_string();
        };

        match self.call_api(assistant_id, message, from, context).await {
            Ok(reply) => reply,
            Err(WhatsAppError::Api { status, message }) => {
                error!("Twilio Assistant error: {} - {}", status, message);
                ASSISTANT_FAILED_MESSAGE.to_string()
            }
            Err(e @ (WhatsAppError::Http(_) | WhatsAppError::Timeout(_))) => {
                error!("Error connecting to AI Assistant: {}", e);
                ASSISTANT_CONNECTION_MESSAGE.to_string()
            }
            Err(e) => {
                error!("Unexpected error with AI Assistant: {}", e);
                ASSISTANT_UNEXPECTED_MESSAGE.to_string()
            }
        }
    }
}

/// A greeting keyword anywhere in the message, or a very short message
pub fn is_simple_greeting(message: &str) -> bool {
    let normalized = message.to_lowercase();
    let normalized = normalized.trim();
    GREETING_KEYWORDS.iter().any(|kw| normalized.contains(kw))
        || normalized.chars().count() < SHORT_MESSAGE_CHARS
}

/// Alphanumeric characters of the sender, used for session and identity
pub fn session_key(from: &str) -> String {
    from.chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Pull the reply text out of the assistant's JSON.
///
/// Tried in order: `response` as a string, `response.text`, then the first
/// non-empty of `body`, `content` and `message`, else the whole document.
pub fn extract_reply(result: &Value) -> Option<String> {
    match result.get("response") {
        Some(Value::String(text)) => return Some(text.clone()),
        Some(Value::Object(response)) => {
            return response
                .get("text")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        _ => {}
    }

    for field in ["body", "content", "message"] {
        if let Some(value) = result.get(field).filter(|v| is_truthy(v)) {
            return Some(match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            });
        }
    }

    Some(result.to_string())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn assistant(server: &MockServer, assistant_id: Option<&str>) -> TwilioAssistant {
        let config = TwilioConfig {
            account_sid: "AC123".into(),
            auth_token: "token".into(),
            assistant_id: assistant_id.map(str::to_string),
            assistant_base_url: server.uri(),
            ..Default::default()
        };
        TwilioAssistant::from_config(&config)
    }

    #[test]
    fn test_extract_reply_variants() {
        assert_eq!(extract_reply(&json!({"response": "hola"})).unwrap(), "hola");
        assert_eq!(
            extract_reply(&json!({"response": {"text": "anidado"}})).unwrap(),
            "anidado"
        );
        assert!(extract_reply(&json!({"response": {"other": 1}})).is_none());
        assert_eq!(extract_reply(&json!({"body": "b", "content": "c"})).unwrap(), "b");
        assert_eq!(extract_reply(&json!({"body": "", "content": "c"})).unwrap(), "c");
        assert_eq!(extract_reply(&json!({"message": "m"})).unwrap(), "m");
        assert_eq!(extract_reply(&json!({"x": 1})).unwrap(), r#"{"x":1}"#);
    }

    #[test]
    fn test_identity_json_layout() {
        let context = AssistantContext {
            intent: "hacer_pedido",
            confidence: 1.0,
        };
        assert_eq!(
            context.to_identity_json().unwrap(),
            r#"{"intent": "hacer_pedido", "confidence": 1.0}"#
        );
    }

    #[test]
    fn test_greeting_detection() {
        assert!(is_simple_greeting("Hola, quiero saber de mi pedido"));
        assert!(is_simple_greeting("ok"));
        assert!(!is_simple_greeting("necesito saber el precio de la milanesa"));
    }

    #[test]
    fn test_session_key() {
        assert_eq!(session_key("whatsapp:+54 911"), "whatsapp54911");
    }

    #[tokio::test]
    async fn test_first_greeting_skips_network() {
        let server = MockServer::start().await;
        // Any request would fail the expectation
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let reply = assistant(&server, Some("UA1"))
            .send_to_ai_assistant("hola", "whatsapp:+1", None, true)
            .await;
        assert_eq!(reply, WELCOME_MESSAGE);
    }

    #[tokio::test]
    async fn test_missing_assistant_id() {
        let server = MockServer::start().await;
        let reply = assistant(&server, None)
            .send_to_ai_assistant("necesito el precio de la napolitana", "whatsapp:+1", None, false)
            .await;
        assert_eq!(reply, ASSISTANT_UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn test_payload_and_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/Assistants/UA1/Messages"))
            .and(header_exists("authorization"))
            .and(body_json(json!({
                "identity": "phone:whatsapp1555|context:{\"intent\": \"saludo\", \"confidence\": 0.3}",
                "session_id": "session_whatsapp1555",
                "body": "cuánto sale la suprema?"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"response": "Sale $2000"})))
            .expect(1)
            .mount(&server)
            .await;

        let context = AssistantContext {
            intent: "saludo",
            confidence: 0.3,
        };
        let reply = assistant(&server, Some("UA1"))
            .send_to_ai_assistant("cuánto sale la suprema?", "whatsapp:+1555", Some(&context), false)
            .await;
        assert_eq!(reply, "Sale $2000");
    }

    #[tokio::test]
    async fn test_error_status_maps_to_failed_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let reply = assistant(&server, Some("UA1"))
            .send_to_ai_assistant("quiero saber algo largo", "whatsapp:+1", None, false)
            .await;
        assert_eq!(reply, ASSISTANT_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn test_connection_error() {
        let config = TwilioConfig {
            assistant_id: Some("UA1".into()),
            // Nothing listens on port 9 locally
            assistant_base_url: "http://127.0.0.1:9".into(),
            ..Default::default()
        };
        let reply = TwilioAssistant::from_config(&config)
            .send_to_ai_assistant("quiero saber algo largo", "whatsapp:+1", None, false)
            .await;
        assert_eq!(reply, ASSISTANT_CONNECTION_MESSAGE);
    }

    #[tokio::test]
    async fn test_invalid_json_is_unexpected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let reply = assistant(&server, Some("UA1"))
            .send_to_ai_assistant("quiero saber algo largo", "whatsapp:+1", None, false)
            .await;
        assert_eq!(reply, ASSISTANT_UNEXPECTED_MESSAGE);
    }
}
