//! Customer, conversation and message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A WhatsApp customer, keyed by phone number (without the `whatsapp:` prefix)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Name given to customers we only know by number: `"Customer 5678"`
    pub fn default_name(phone_number: &str) -> String {
        let digits: Vec<char> = phone_number.chars().collect();
        let tail: String = digits[digits.len().saturating_sub(4)..].iter().collect();
        format!("Customer {}", tail)
    }
}

/// Where a conversation currently is in the menu flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConversationState {
    #[default]
    #[serde(rename = "saludo")]
    Greeting,
    #[serde(rename = "menu_principal")]
    MainMenu,
    #[serde(rename = "navegando_productos")]
    BrowsingProducts,
    #[serde(rename = "detalle_producto")]
    ProductDetail,
    #[serde(rename = "agregando_al_carrito")]
    AddingToCart,
    #[serde(rename = "checkout")]
    Checkout,
    #[serde(rename = "estado_pedido")]
    OrderStatus,
    #[serde(rename = "confirmacion_pedido")]
    OrderConfirmation,
    #[serde(rename = "ofertas_especiales")]
    SpecialOffers,
    #[serde(rename = "atencion_cliente")]
    CustomerSupport,
}

impl ConversationState {
    pub const ALL: [ConversationState; 10] = [
        ConversationState::Greeting,
        ConversationState::MainMenu,
        ConversationState::BrowsingProducts,
        ConversationState::ProductDetail,
        ConversationState::AddingToCart,
        ConversationState::Checkout,
        ConversationState::OrderStatus,
        ConversationState::OrderConfirmation,
        ConversationState::SpecialOffers,
        ConversationState::CustomerSupport,
    ];

    /// Stored name of the state
    pub fn as_str(self) -> &'static str {
        match self {
            ConversationState::Greeting => "saludo",
            ConversationState::MainMenu => "menu_principal",
            ConversationState::BrowsingProducts => "navegando_productos",
            ConversationState::ProductDetail => "detalle_producto",
            ConversationState::AddingToCart => "agregando_al_carrito",
            ConversationState::Checkout => "checkout",
            ConversationState::OrderStatus => "estado_pedido",
            ConversationState::OrderConfirmation => "confirmacion_pedido",
            ConversationState::SpecialOffers => "ofertas_especiales",
            ConversationState::CustomerSupport => "atencion_cliente",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == value)
            .ok_or_else(|| Error::Validation(format!("Unknown conversation state: {}", value)))
    }
}

/// Who is currently answering the customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HandlerType {
    #[default]
    Bot,
    HumanRequested,
    HumanActive,
    Resolved,
}

impl HandlerType {
    pub fn as_str(self) -> &'static str {
        match self {
            HandlerType::Bot => "bot",
            HandlerType::HumanRequested => "human_requested",
            HandlerType::HumanActive => "human_active",
            HandlerType::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "bot" => Ok(HandlerType::Bot),
            "human_requested" => Ok(HandlerType::HumanRequested),
            "human_active" => Ok(HandlerType::HumanActive),
            "resolved" => Ok(HandlerType::Resolved),
            other => Err(Error::Validation(format!("Unknown handler type: {}", other))),
        }
    }

    /// Whether a person, not the bot, owns the conversation
    pub fn is_human(self) -> bool {
        matches!(self, HandlerType::HumanRequested | HandlerType::HumanActive)
    }
}

/// A conversation with one customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub customer_id: i64,
    pub current_state: ConversationState,
    pub handler_type: HandlerType,
    pub human_agent: Option<String>,
    /// Free-form JSON object (last intent, confidence, ...)
    pub context_data: serde_json::Value,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

impl Conversation {
    pub fn human_support_requested(&self) -> bool {
        self.handler_type == HandlerType::HumanRequested
    }

    /// Move from bot handling to "human requested".
    /// Returns `false` when the conversation is not currently handled by the bot.
    pub fn request_human_support(&mut self) -> bool {
        if self.handler_type != HandlerType::Bot {
            return false;
        }
        self.handler_type = HandlerType::HumanRequested;
        self.touch();
        true
    }

    pub fn assign_human_agent(&mut self, agent: impl Into<String>) {
        self.handler_type = HandlerType::HumanActive;
        self.human_agent = Some(agent.into());
        self.touch();
    }

    pub fn return_to_bot(&mut self) {
        self.handler_type = HandlerType::Bot;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Message direction relative to the shop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "inbound" => Ok(Direction::Inbound),
            "outbound" => Ok(Direction::Outbound),
            other => Err(Error::Validation(format!("Unknown direction: {}", other))),
        }
    }
}

/// A single WhatsApp message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub conversation_id: i64,
    pub content: String,
    pub media_url: Option<String>,
    pub direction: Direction,
    pub timestamp: DateTime<Utc>,
    pub delivered: bool,
    pub read: bool,
    pub whatsapp_message_id: Option<String>,
}

/// Fields for a message about to be recorded
#[derive(Debug, Clone)]
pub struct NewMessage<'a> {
    pub content: &'a str,
    pub media_url: Option<&'a str>,
    pub direction: Direction,
    pub whatsapp_message_id: Option<&'a str>,
}

/// Entry in the human support queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportTicket {
    pub id: i64,
    pub conversation_id: i64,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
}
