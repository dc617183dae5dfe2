//! bt-core: Breaders WhatsApp bot core library
//!
//! Configuration, errors, domain models, SQLite persistence, intent
//! detection and the catalog and customer support services.

pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod intent;
pub mod models;
pub mod store;
pub mod support;

pub use catalog::{CatalogService, OfferWithProducts};
pub use config::{BotConfig, Config, DatabaseConfig, DevConfig, ServerConfig, TwilioConfig};
pub use error::{Error, ErrorKind, Result, log_error};
pub use intent::{Intent, IntentMatch, detect_intent};
pub use models::{
    Category, Conversation, ConversationState, Customer, Direction, HandlerType, Message,
    MessageTemplate, NewMessage, Product, SpecialOffer, SupportTicket,
};
pub use store::{InboundRecord, Store};
