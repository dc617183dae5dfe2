//! Conversation flows through the bot service with a scripted assistant

use std::sync::Arc;

use async_trait::async_trait;

use bt_core::constants::{
    CUSTOMER_SUPPORT_MESSAGE, ERROR_MESSAGE, MAIN_MENU_MESSAGE, ORDER_STATUS_MESSAGE,
    SPECIAL_OFFERS_MESSAGE, VIEW_PRODUCTS_MESSAGE,
};
use bt_core::{ConversationState, Store};
use bt_whatsapp::handlers::{ChatbotHandler, HandlerContext};
use bt_whatsapp::{ConversationRouter, IncomingMessage, MessageHandler, WhatsAppBot, WhatsAppError};

use super::block_on;
use crate::logged::LoggedCase;
use crate::runner::{CaseResult, Suite};

const PHONE: &str = "+5491100000000";
const ASSISTANT_PREFIX: &str = "Asistente:";

pub fn suite() -> Suite {
    Suite::new("test_whatsapp_flow")
        .case("test_greeting_flow", greeting_flow)
        .case("test_product_catalog_flow", product_catalog_flow)
        .case("test_order_status_flow", order_status_flow)
        .case("test_special_offers_flow", special_offers_flow)
        .case("test_customer_support_flow", customer_support_flow)
        .case("test_error_handling", error_handling)
        .case("test_fallback_to_ai", fallback_to_ai)
}

struct ScriptedAssistant;

#[async_trait]
impl MessageHandler for ScriptedAssistant {
    async fn process_message(
        &self,
        _from: &str,
        message: &str,
        _context: &HandlerContext,
    ) -> bt_whatsapp::Result<Option<String>> {
        Ok(Some(format!("{} {}", ASSISTANT_PREFIX, message)))
    }
}

struct UnreachableAssistant;

#[async_trait]
impl MessageHandler for UnreachableAssistant {
    async fn process_message(
        &self,
        _from: &str,
        _message: &str,
        _context: &HandlerContext,
    ) -> bt_whatsapp::Result<Option<String>> {
        Err(WhatsAppError::Http("connection refused".into()))
    }
}

fn bot(assistant: Arc<dyn MessageHandler>) -> anyhow::Result<WhatsAppBot> {
    let store = Arc::new(Store::in_memory()?);
    let router = ConversationRouter::new(Arc::new(ChatbotHandler::new()), assistant);
    Ok(WhatsAppBot::new(store, router, None))
}

/// Send `body` as the test customer and return the reply
fn say(case: &LoggedCase, bot: &WhatsAppBot, body: &str) -> anyhow::Result<String> {
    case.log_step(&format!("Customer says: {}", body));
    let incoming = IncomingMessage {
        from: format!("whatsapp:{}", PHONE),
        body: body.to_string(),
        ..Default::default()
    };
    let reply = block_on(bot.handle_incoming(&incoming))??;
    Ok(reply.unwrap_or_default())
}

fn current_state(bot: &WhatsAppBot) -> anyhow::Result<Option<ConversationState>> {
    Ok(bot
        .store()
        .conversation_for_phone(PHONE)?
        .map(|c| c.current_state))
}

fn greeting_flow(case: &LoggedCase) -> CaseResult {
    let bot = bot(Arc::new(ScriptedAssistant))?;
    let reply = say(case, &bot, "Hola")?;
    case.assert_with_log(!reply.is_empty(), "The bot answers a greeting", None);
    case.assert_equal_with_log(
        current_state(&bot)?,
        Some(ConversationState::Greeting),
        "A new conversation starts in saludo",
        None,
    );
    Ok(())
}

fn product_catalog_flow(case: &LoggedCase) -> CaseResult {
    let bot = bot(Arc::new(ScriptedAssistant))?;
    let reply = say(case, &bot, "1")?;
    case.assert_equal_with_log(reply.as_str(), VIEW_PRODUCTS_MESSAGE, "Option 1 lists products", None);
    case.assert_equal_with_log(
        current_state(&bot)?,
        Some(ConversationState::BrowsingProducts),
        "Conversation moves to ver_productos",
        None,
    );
    Ok(())
}

fn order_status_flow(case: &LoggedCase) -> CaseResult {
    let bot = bot(Arc::new(ScriptedAssistant))?;
    let reply = say(case, &bot, "3")?;
    case.assert_equal_with_log(reply.as_str(), ORDER_STATUS_MESSAGE, "Option 3 asks for the order", None);
    Ok(())
}

fn special_offers_flow(case: &LoggedCase) -> CaseResult {
    let bot = bot(Arc::new(ScriptedAssistant))?;
    let reply = say(case, &bot, "4")?;
    case.assert_equal_with_log(reply.as_str(), SPECIAL_OFFERS_MESSAGE, "Option 4 shows offers", None);
    Ok(())
}

fn customer_support_flow(case: &LoggedCase) -> CaseResult {
    let bot = bot(Arc::new(ScriptedAssistant))?;

    let reply = say(case, &bot, "5")?;
    case.assert_equal_with_log(reply.as_str(), CUSTOMER_SUPPORT_MESSAGE, "Option 5 opens support", None);

    let reply = say(case, &bot, "¿Cuál es el horario de atención?")?;
    case.assert_in_with_log("horario", reply.as_str(), "Support answers the schedule", None);
    case.assert_equal_with_log(
        current_state(&bot)?,
        Some(ConversationState::CustomerSupport),
        "Conversation stays in support",
        None,
    );

    let reply = say(case, &bot, "volver")?;
    case.assert_equal_with_log(reply.as_str(), MAIN_MENU_MESSAGE, "volver shows the main menu", None);
    case.assert_equal_with_log(
        current_state(&bot)?,
        Some(ConversationState::MainMenu),
        "Conversation returns to menu_principal",
        None,
    );
    Ok(())
}

fn error_handling(case: &LoggedCase) -> CaseResult {
    let bot = bot(Arc::new(UnreachableAssistant))?;
    let reply = say(case, &bot, "asdfgh")?;
    case.assert_equal_with_log(
        reply.as_str(),
        ERROR_MESSAGE,
        "Assistant failures become the generic error reply",
        None,
    );
    Ok(())
}

fn fallback_to_ai(case: &LoggedCase) -> CaseResult {
    let bot = bot(Arc::new(ScriptedAssistant))?;
    let reply = say(case, &bot, "¿Hacen envíos a Rosario los domingos?")?;
    case.assert_with_log(
        reply.starts_with(ASSISTANT_PREFIX),
        "Unrecognised questions go to the AI assistant",
        Some("AI assistant answered"),
    );

    let stored = bot
        .store()
        .conversation_for_phone(PHONE)?
        .map(|c| bot.store().messages(c.id))
        .transpose()?
        .unwrap_or_default();
    case.assert_equal_with_log(stored.len(), 2, "Both directions are recorded", None);
    Ok(())
}
