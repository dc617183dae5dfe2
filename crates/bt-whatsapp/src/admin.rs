//! Admin API: conversations, hand-off, proactive messages, catalog and templates
//!
//! Mounted under `/api`. When a secret key is configured every request needs
//! `Authorization: Bearer <key>`.

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use bt_core::models::{NewCategory, NewProduct, NewSpecialOffer};
use bt_core::{
    CatalogService, Category, Conversation, Customer, ErrorKind, Message, MessageTemplate,
    OfferWithProducts, Product, SpecialOffer, SupportTicket, log_error,
};

use crate::error::WhatsAppError;
use crate::notifications::OrderNotification;
use crate::twilio::clean_number;
use crate::webhook::WebhookState;

/// Generic API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error returned by admin handlers, rendered as `{"error": ...}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

impl From<WhatsAppError> for ApiError {
    fn from(err: WhatsAppError) -> Self {
        let status = match (&err, err.kind()) {
            (WhatsAppError::CredentialsNotSet, _) => StatusCode::SERVICE_UNAVAILABLE,
            (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
            (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
            (_, ErrorKind::Twilio) | (_, ErrorKind::Timeout) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log_error(&err, &[("status", &status)]);
        }
        Self::new(status, err.to_string())
    }
}

impl From<bt_core::Error> for ApiError {
    fn from(err: bt_core::Error) -> Self {
        WhatsAppError::from(err).into()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Admin routes, relative to `/api`
pub fn routes(state: WebhookState) -> Router<WebhookState> {
    Router::new()
        // {key} is the phone number on GET and the conversation id on hand-off
        .route("/conversations/{key}", get(conversation_by_phone))
        .route("/conversations/{key}/handoff", post(handoff))
        .route("/support/queue", get(support_queue))
        .route("/messages", post(send_message))
        .route("/notifications/order", post(order_notification))
        .route("/catalog/categories", get(categories).post(create_category))
        .route("/catalog/products", get(products).post(create_product))
        .route("/catalog/products/{id}", get(product))
        .route("/catalog/offers", get(offers).post(create_offer))
        .route("/templates", get(templates))
        .route("/templates/{name}", get(template).put(put_template))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Bearer key authentication; open when no key is configured
async fn auth_middleware(
    State(state): State<WebhookState>,
    request: Request,
    next: Next,
) -> std::result::Result<Response, StatusCode> {
    let Some(expected) = state.secret_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match provided {
        Some(key) if key == expected => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

// ============================================================================
// Conversations
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationView {
    pub customer: Customer,
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

async fn conversation_by_phone(
    State(state): State<WebhookState>,
    Path(phone): Path<String>,
) -> ApiResult<ConversationView> {
    let store = state.bot.store();
    let phone = clean_number(&phone);
    let conversation = store
        .conversation_for_phone(phone)?
        .ok_or_else(|| ApiError::not_found(format!("No active conversation for {}", phone)))?;
    let customer = store.customer(conversation.customer_id)?;
    let messages = store.messages(conversation.id)?;

    Ok(Json(ConversationView {
        customer,
        conversation,
        messages,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffAction {
    Request,
    Assign,
    Release,
}

#[derive(Debug, Deserialize)]
pub struct HandoffRequest {
    pub action: HandoffAction,
    #[serde(default)]
    pub agent: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HandoffResponse {
    pub conversation: Conversation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<SupportTicket>,
}

async fn handoff(
    State(state): State<WebhookState>,
    Path(id): Path<i64>,
    Json(req): Json<HandoffRequest>,
) -> ApiResult<HandoffResponse> {
    info!("Hand-off {:?} for conversation {}", req.action, id);
    let bot = &state.bot;

    let (conversation, ticket) = match req.action {
        HandoffAction::Request => {
            let ticket = bot.request_human_support(id)?.ok_or_else(|| {
                ApiError::new(
                    StatusCode::CONFLICT,
                    format!("Conversation {} is not handled by the bot", id),
                )
            })?;
            (bot.store().conversation(id)?, Some(ticket))
        }
        HandoffAction::Assign => {
            let agent = req
                .agent
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .ok_or_else(|| ApiError::bad_request("agent is required to assign"))?;
            (bot.assign_human_agent(id, agent)?, None)
        }
        HandoffAction::Release => (bot.return_to_bot(id)?, None),
    };

    Ok(Json(HandoffResponse {
        conversation,
        ticket,
    }))
}

async fn support_queue(State(state): State<WebhookState>) -> ApiResult<Vec<SupportTicket>> {
    Ok(Json(state.bot.store().support_queue()?))
}

// ============================================================================
// Outbound messages
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub to: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
}

async fn send_message(
    State(state): State<WebhookState>,
    Json(req): Json<SendMessageRequest>,
) -> std::result::Result<(StatusCode, Json<Message>), ApiError> {
    debug!("Proactive message to {}", req.to);

    let message = match (&req.template, &req.body) {
        (Some(template), _) => {
            let context = req.context.clone().unwrap_or_default();
            state
                .bot
                .send_template_message(&req.to, template, &context)
                .await?
        }
        (None, Some(body)) if !body.trim().is_empty() || req.media_url.is_some() => {
            state
                .bot
                .send_message(&req.to, body, req.media_url.as_deref())
                .await?
        }
        (None, None) if req.media_url.is_some() => {
            state
                .bot
                .send_message(&req.to, "", req.media_url.as_deref())
                .await?
        }
        _ => return Err(ApiError::bad_request("body, media_url or template is required")),
    };

    Ok((StatusCode::CREATED, Json(message)))
}

async fn order_notification(
    State(state): State<WebhookState>,
    Json(req): Json<OrderNotification>,
) -> std::result::Result<(StatusCode, Json<Message>), ApiError> {
    let message = state.bot.send_order_notification(&req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<i64>,
    pub q: Option<String>,
}

async fn categories(State(state): State<WebhookState>) -> ApiResult<Vec<Category>> {
    Ok(Json(CatalogService::new(state.bot.store()).categories()?))
}

async fn create_category(
    State(state): State<WebhookState>,
    Json(req): Json<NewCategory>,
) -> std::result::Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.bot.store().create_category(&req)?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn products(
    State(state): State<WebhookState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Vec<Product>> {
    let store = state.bot.store();
    let catalog = CatalogService::new(store);

    let products = match (query.category, query.q.as_deref().map(str::trim)) {
        (_, Some(q)) if !q.is_empty() => {
            let mut found = catalog.search_products(q)?;
            if let Some(category_id) = query.category {
                found.retain(|p| p.category_id == category_id);
            }
            found
        }
        (Some(category_id), _) => catalog.products_by_category(category_id)?,
        _ => store.products()?,
    };
    Ok(Json(products))
}

async fn product(State(state): State<WebhookState>, Path(id): Path<i64>) -> ApiResult<Product> {
    CatalogService::new(state.bot.store())
        .product_details(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Product {} not found", id)))
}

async fn create_product(
    State(state): State<WebhookState>,
    Json(req): Json<NewProduct>,
) -> std::result::Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.bot.store().create_product(&req)?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn offers(State(state): State<WebhookState>) -> ApiResult<Vec<OfferWithProducts>> {
    Ok(Json(
        CatalogService::new(state.bot.store()).active_special_offers(Utc::now())?,
    ))
}

async fn create_offer(
    State(state): State<WebhookState>,
    Json(req): Json<NewSpecialOffer>,
) -> std::result::Result<(StatusCode, Json<SpecialOffer>), ApiError> {
    let offer = state.bot.store().create_offer(&req)?;
    Ok((StatusCode::CREATED, Json(offer)))
}

// ============================================================================
// Templates
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
}

async fn templates(State(state): State<WebhookState>) -> ApiResult<Vec<MessageTemplate>> {
    Ok(Json(state.bot.store().templates()?))
}

async fn template(
    State(state): State<WebhookState>,
    Path(name): Path<String>,
) -> ApiResult<MessageTemplate> {
    state
        .bot
        .store()
        .template(&name)?
        .map(Json)
        .ok_or_else(|| ApiError::from(WhatsAppError::TemplateNotFound(name)))
}

async fn put_template(
    State(state): State<WebhookState>,
    Path(name): Path<String>,
    Json(req): Json<TemplateRequest>,
) -> ApiResult<MessageTemplate> {
    if req.content.trim().is_empty() {
        return Err(ApiError::bad_request("content must not be empty"));
    }
    let template = state
        .bot
        .store()
        .upsert_template(&name, &req.content, req.description.as_deref())?;
    info!("Template {} saved", name);
    Ok(Json(template))
}
