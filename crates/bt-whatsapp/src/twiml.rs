//! TwiML replies for the Twilio webhook

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

/// Escape text for XML element content and attributes
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// `<Response>` document with an optional `<Message>`
pub fn messaging_response(message: Option<&str>) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
    if let Some(message) = message {
        xml.push_str("<Message>");
        xml.push_str(&escape_xml(message));
        xml.push_str("</Message>");
    }
    xml.push_str("</Response>");
    xml
}

/// axum response carrying TwiML with a `text/xml` content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Twiml(pub Option<String>);

impl Twiml {
    pub fn message(text: impl Into<String>) -> Self {
        Self(Some(text.into()))
    }

    pub fn empty() -> Self {
        Self(None)
    }
}

impl IntoResponse for Twiml {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/xml")],
            messaging_response(self.0.as_deref()),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape_xml(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &apos;Jerry&apos;&lt;/b&gt;"
        );
        assert_eq!(escape_xml("¡Hola! 🍽️"), "¡Hola! 🍽️");
    }

    #[test]
    fn test_messaging_response() {
        assert_eq!(
            messaging_response(Some("a < b")),
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>a &lt; b</Message></Response>"#
        );
        assert_eq!(
            messaging_response(None),
            r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#
        );
    }

    #[test]
    fn test_into_response_content_type() {
        let response = Twiml::message("hola").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/xml"
        );
    }
}
