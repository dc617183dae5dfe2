//! Conversation handlers
//!
//! A [`MessageHandler`] answers a single inbound message or declines with
//! `None`. The [`ConversationRouter`] picks which handler answers.

mod ai;
mod chatbot;
mod router;

use async_trait::async_trait;

use bt_core::IntentMatch;

use crate::error::Result;

pub use ai::AssistantHandler;
pub use chatbot::ChatbotHandler;
pub use router::{ConversationRouter, RouteOutcome};

/// What the router knows about a message when it asks a handler
#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerContext {
    pub intent: Option<IntentMatch>,
    pub first_interaction: bool,
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Reply to `message` from `from`, or `Ok(None)` to let another handler try
    async fn process_message(
        &self,
        from: &str,
        message: &str,
        context: &HandlerContext,
    ) -> Result<Option<String>>;
}
