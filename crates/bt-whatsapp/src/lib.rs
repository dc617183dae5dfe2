//! bt-whatsapp: Breaders WhatsApp bot over the Twilio API
//!
//! Webhook server, conversation routing between the canned chatbot and the
//! Twilio AI Assistant, proactive messages and the admin API.

pub mod admin;
pub mod assistant;
pub mod bot;
pub mod error;
pub mod handlers;
pub mod notifications;
pub mod twilio;
pub mod twiml;
pub mod webhook;

pub use assistant::{AssistantApi, AssistantContext, TwilioAssistant};
pub use bot::WhatsAppBot;
pub use error::{Result, WhatsAppError};
pub use handlers::{ConversationRouter, MessageHandler};
pub use notifications::{NotificationKind, OrderNotification};
pub use twilio::{IncomingMessage, IncomingNumber, MessageSender, TwilioClient};
pub use webhook::{PublicUrl, WEBHOOK_PATH, WebhookServer, WebhookState};
