use std::sync::Arc;

use tracing::info;

use bt_core::constants::{ERROR_MESSAGE, INTENT_MEDIUM_CONFIDENCE, MAIN_MENU_MESSAGE, NOT_UNDERSTOOD_MESSAGE};
use bt_core::{ConversationState, IntentMatch, detect_intent, log_error, support};

use super::{HandlerContext, MessageHandler};
use crate::error::Result;

/// Reply chosen for a message and where the conversation goes next
#[derive(Debug, Clone, PartialEq)]
pub struct RouteOutcome {
    pub reply: String,
    /// New conversation state, `None` to keep the current one
    pub next_state: Option<ConversationState>,
    pub intent: Option<IntentMatch>,
}

impl RouteOutcome {
    fn reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            next_state: None,
            intent: None,
        }
    }
}

/// Detects intent and routes each message to the chatbot or the AI assistant
pub struct ConversationRouter {
    chatbot: Arc<dyn MessageHandler>,
    assistant: Arc<dyn MessageHandler>,
    threshold: f64,
}

impl ConversationRouter {
    pub fn new(chatbot: Arc<dyn MessageHandler>, assistant: Arc<dyn MessageHandler>) -> Self {
        Self {
            chatbot,
            assistant,
            threshold: INTENT_MEDIUM_CONFIDENCE,
        }
    }

    /// Minimum confidence for the chatbot to answer
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Route one message. Never fails: internal errors become the generic error reply.
    pub async fn process_message(
        &self,
        from: &str,
        message: &str,
        first_interaction: bool,
        state: ConversationState,
    ) -> RouteOutcome {
        match self.route(from, message, first_interaction, state).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log_error(&e, &[("from", &from), ("state", &state.as_str())]);
                RouteOutcome::reply(ERROR_MESSAGE)
            }
        }
    }

    async fn route(
        &self,
        from: &str,
        message: &str,
        first_interaction: bool,
        state: ConversationState,
    ) -> Result<RouteOutcome> {
        let preview: String = message.chars().take(50).collect();
        info!("Processing message: {}...", preview);

        if state == ConversationState::CustomerSupport {
            if support::is_returning_to_menu(message) {
                return Ok(RouteOutcome {
                    reply: MAIN_MENU_MESSAGE.to_string(),
                    next_state: Some(ConversationState::MainMenu),
                    intent: None,
                });
            }
            return Ok(RouteOutcome::reply(support::get_support_response(message)));
        }

        let detected = detect_intent(message);
        info!(
            "Intent detected: {} with confidence {:.2}",
            detected.intent, detected.confidence
        );
        let context = HandlerContext {
            intent: Some(detected),
            first_interaction,
        };

        if detected.intent.is_known() && detected.confidence >= self.threshold {
            if let Some(reply) = self.chatbot.process_message(from, message, &context).await? {
                return Ok(RouteOutcome {
                    reply,
                    next_state: detected.intent.target_state(),
                    intent: Some(detected),
                });
            }
        }

        info!("Using AI assistant for the reply");
        let reply = self
            .assistant
            .process_message(from, message, &context)
            .await?
            .filter(|reply| !reply.trim().is_empty())
            .unwrap_or_else(|| NOT_UNDERSTOOD_MESSAGE.to_string());

        Ok(RouteOutcome {
            reply,
            next_state: None,
            intent: Some(detected),
        })
    }
}
