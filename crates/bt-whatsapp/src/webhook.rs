//! Webhook server for receiving WhatsApp messages from Twilio

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Form, Request, State, rejection::FormRejection},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use bt_core::constants::WEBHOOK_FAILURE_MESSAGE;
use bt_core::log_error;

use crate::admin;
use crate::bot::WhatsAppBot;
use crate::error::{Result, WhatsAppError};
use crate::twilio::{IncomingMessage, verify_signature};
use crate::twiml::Twiml;

pub const WEBHOOK_PATH: &str = "/webhook/whatsapp/";

const SIGNATURE_HEADER: &str = "X-Twilio-Signature";
const LOGGED_BODY_CHARS: usize = 50;

/// Largest webhook body read into memory; Twilio posts are a few KiB
pub const MAX_WEBHOOK_BODY: usize = 64 * 1024;

/// Public base URL, set at startup or later by the dev launcher once the tunnel is up
pub type PublicUrl = Arc<RwLock<Option<String>>>;

pub fn public_url(url: Option<String>) -> PublicUrl {
    Arc::new(RwLock::new(url))
}

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub bot: Arc<WhatsAppBot>,
    /// Bearer key for `/api`
    pub secret_key: Option<String>,
    /// Auth token used to check `X-Twilio-Signature`; validation is off when `None`
    pub signature_token: Option<String>,
    pub public_url: PublicUrl,
}

/// Webhook server
pub struct WebhookServer {
    addr: SocketAddr,
    state: WebhookState,
}

impl WebhookServer {
    pub fn new(
        addr: SocketAddr,
        bot: Arc<WhatsAppBot>,
        secret_key: Option<String>,
        signature_token: Option<String>,
        public_url: PublicUrl,
    ) -> Self {
        let state = WebhookState {
            bot,
            secret_key,
            signature_token,
            public_url,
        };
        Self { addr, state }
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Start the webhook server
    pub async fn start(self) -> Result<()> {
        info!("Starting WhatsApp webhook server on {}", self.addr);
        if self.state.signature_token.is_some() {
            info!("Twilio signature validation enabled");
        }

        let app = self.router();

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| WhatsAppError::Config(format!("Failed to bind {}: {}", self.addr, e)))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| WhatsAppError::Http(e.to_string()))?;

        Ok(())
    }
}

/// Webhook, health and admin routes with their middleware
pub fn router(state: WebhookState) -> Router {
    let webhook = Router::new()
        .route("/webhook/whatsapp", post(handle_webhook))
        .route(WEBHOOK_PATH, post(handle_webhook))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            signature_middleware,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(webhook)
        .nest("/api", admin::routes(state.clone()))
        .layer(middleware::from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Handle incoming WhatsApp webhook
async fn handle_webhook(
    State(state): State<WebhookState>,
    form: std::result::Result<Form<IncomingMessage>, FormRejection>,
) -> Twiml {
    let msg = match form {
        Ok(Form(msg)) => msg,
        Err(rejection) => {
            log_error(&rejection, &[("path", &WEBHOOK_PATH)]);
            return Twiml::message(WEBHOOK_FAILURE_MESSAGE);
        }
    };

    match state.bot.handle_incoming(&msg).await {
        Ok(reply) => Twiml(reply),
        Err(e) => {
            log_error(&e, &[("from", &msg.from), ("sid", &msg.message_sid)]);
            Twiml::message(WEBHOOK_FAILURE_MESSAGE)
        }
    }
}

/// Reject webhook calls whose Twilio signature does not match
async fn signature_middleware(
    State(state): State<WebhookState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(auth_token) = state.signature_token.as_deref() else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(status) => return status.into_response(),
    };

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or(parts.uri.path());
    let base = state.public_url.read().await.clone();
    let url = signed_url(base.as_deref(), &parts.headers, path);

    let signature = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !verify_signature(auth_token, &url, &form_params(&bytes), signature) {
        warn!("{} for {}", WhatsAppError::SignatureVerificationFailed, url);
        return StatusCode::FORBIDDEN.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// The URL Twilio signed: the public URL when known, otherwise rebuilt from `Host`
fn signed_url(public_url: Option<&str>, headers: &HeaderMap, path: &str) -> String {
    match public_url {
        Some(base) => format!("{}{}", base.trim_end_matches('/'), path),
        None => {
            let host = headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("localhost");
            format!("http://{}{}", host, path)
        }
    }
}

/// Buffer a webhook body, refusing anything over [`MAX_WEBHOOK_BODY`]
async fn read_body(body: Body) -> std::result::Result<Bytes, StatusCode> {
    axum::body::to_bytes(body, MAX_WEBHOOK_BODY).await.map_err(|e| {
        warn!("Rejecting webhook body (limit {} bytes): {}", MAX_WEBHOOK_BODY, e);
        StatusCode::PAYLOAD_TOO_LARGE
    })
}

fn form_params(body: &[u8]) -> Vec<(String, String)> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

/// Log WhatsApp webhook traffic: method and path, form fields and timing
async fn log_requests(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if !path.contains("/whatsapp") {
        return next.run(request).await;
    }

    let start = Instant::now();
    info!("Incoming {} request to {}", request.method(), path);

    let (parts, body) = request.into_parts();
    let bytes = match read_body(body).await {
        Ok(bytes) => bytes,
        Err(status) => {
            info!("Response status: {}", status.as_u16());
            return status.into_response();
        }
    };
    for (key, value) in form_params(&bytes) {
        debug!("  {}: {}", key, loggable_value(&key, &value));
    }

    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;
    info!(
        "Response status: {} (took {:.3}s)",
        response.status().as_u16(),
        start.elapsed().as_secs_f64()
    );
    response
}

fn loggable_value(key: &str, value: &str) -> String {
    if key == "Body" && value.chars().count() > LOGGED_BODY_CHARS {
        let truncated: String = value.chars().take(LOGGED_BODY_CHARS).collect();
        format!("{}...", truncated)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_url() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "localhost:8000".parse().unwrap());

        assert_eq!(
            signed_url(Some("https://abc.ngrok.io/"), &headers, WEBHOOK_PATH),
            "https://abc.ngrok.io/webhook/whatsapp/"
        );
        assert_eq!(
            signed_url(None, &headers, WEBHOOK_PATH),
            "http://localhost:8000/webhook/whatsapp/"
        );
    }

    #[test]
    fn test_body_truncated_in_logs() {
        let long = "a".repeat(60);
        assert_eq!(loggable_value("Body", &long), format!("{}...", "a".repeat(50)));
        assert_eq!(loggable_value("Body", "hola"), "hola");
        assert_eq!(loggable_value("From", &long), long);
    }

    #[test]
    fn test_form_params() {
        let params = form_params(b"From=whatsapp%3A%2B1555&Body=hola+mundo");
        assert_eq!(
            params,
            vec![
                ("From".to_string(), "whatsapp:+1555".to_string()),
                ("Body".to_string(), "hola mundo".to_string()),
            ]
        );
    }
}
