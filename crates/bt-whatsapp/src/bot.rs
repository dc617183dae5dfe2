//! WhatsApp bot service: inbound flow, proactive sends and human hand-off

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use bt_core::constants::{EMPTY_BODY_MESSAGE, HUMAN_HANDOFF_MESSAGE};
use bt_core::{
    Config, Conversation, Direction, HandlerType, Message, NewMessage, Store, SupportTicket,
};

use crate::assistant::TwilioAssistant;
use crate::error::{Result, WhatsAppError};
use crate::handlers::{AssistantHandler, ChatbotHandler, ConversationRouter};
use crate::twilio::{IncomingMessage, MessageSender, TwilioClient, clean_number};
use crate::webhook::{PublicUrl, WebhookServer};

/// WhatsApp bot wrapper
pub struct WhatsAppBot {
    store: Arc<Store>,
    router: ConversationRouter,
    sender: Option<Arc<dyn MessageSender>>,
}

impl WhatsAppBot {
    /// Assemble a bot from its parts
    pub fn new(
        store: Arc<Store>,
        router: ConversationRouter,
        sender: Option<Arc<dyn MessageSender>>,
    ) -> Self {
        Self {
            store,
            router,
            sender,
        }
    }

    /// Wire the Twilio client, AI assistant and catalog-backed chatbot from configuration.
    /// Without Twilio credentials the bot still answers webhooks but cannot send proactively.
    pub fn from_config(config: &Config, store: Arc<Store>) -> Self {
        let sender: Option<Arc<dyn MessageSender>> = match TwilioClient::from_config(&config.twilio) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Proactive messages disabled: {}", e);
                None
            }
        };

        let assistant = Arc::new(TwilioAssistant::from_config(&config.twilio));
        let router = ConversationRouter::new(
            Arc::new(ChatbotHandler::with_catalog(Arc::clone(&store))),
            Arc::new(AssistantHandler::new(assistant)),
        )
        .with_threshold(config.bot.intent_threshold);

        Self::new(store, router, sender)
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Handle a webhook message and return the reply to put in the TwiML, if any
    pub async fn handle_incoming(&self, incoming: &IncomingMessage) -> Result<Option<String>> {
        let body = incoming.body.trim();
        let preview: String = body.chars().take(50).collect();
        info!("Received message from {}: {}...", incoming.from, preview);

        if body.is_empty() {
            warn!("Received empty message body");
            return Ok(Some(EMPTY_BODY_MESSAGE.to_string()));
        }

        let phone = clean_number(&incoming.from);
        let sid = Some(incoming.message_sid.as_str()).filter(|sid| !sid.is_empty());
        let record = self
            .store
            .record_inbound(phone, body, incoming.media(), sid)?;
        let mut conversation = record.conversation;

        match conversation.handler_type {
            HandlerType::HumanActive => {
                info!(
                    "Conversation {} is handled by {}, not replying",
                    conversation.id,
                    conversation.human_agent.as_deref().unwrap_or("an agent")
                );
                return Ok(None);
            }
            HandlerType::HumanRequested => {
                self.record_reply(conversation.id, HUMAN_HANDOFF_MESSAGE)?;
                return Ok(Some(HUMAN_HANDOFF_MESSAGE.to_string()));
            }
            HandlerType::Bot | HandlerType::Resolved => {}
        }

        let outcome = self
            .router
            .process_message(
                &incoming.from,
                body,
                record.first_interaction,
                conversation.current_state,
            )
            .await;

        if let Some(state) = outcome.next_state {
            conversation.current_state = state;
        }
        if let Some(detected) = outcome.intent {
            let mut context = match conversation.context_data.take() {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            context.insert("intent".into(), Value::from(detected.intent.as_str()));
            context.insert("confidence".into(), Value::from(detected.confidence));
            conversation.context_data = Value::Object(context);
        }
        // An agent may have taken over while the router was waiting
        self.store.update_state_and_context(
            conversation.id,
            conversation.current_state,
            &conversation.context_data,
        )?;
        self.record_reply(conversation.id, &outcome.reply)?;

        Ok(Some(outcome.reply))
    }

    fn record_reply(&self, conversation_id: i64, reply: &str) -> Result<()> {
        self.store.record_message(
            conversation_id,
            NewMessage {
                content: reply,
                media_url: None,
                direction: Direction::Outbound,
                whatsapp_message_id: None,
            },
        )?;
        Ok(())
    }

    fn sender(&self) -> Result<&Arc<dyn MessageSender>> {
        self.sender.as_ref().ok_or(WhatsAppError::CredentialsNotSet)
    }

    /// Send a message outside of a webhook reply and record it in the customer's conversation
    pub async fn send_message(
        &self,
        to: &str,
        body: &str,
        media_url: Option<&str>,
    ) -> Result<Message> {
        let sid = self.sender()?.send_message(to, body, media_url).await?;

        let (customer, _) = self.store.get_or_create_customer(clean_number(to))?;
        let (conversation, _) = self.store.get_or_create_conversation(customer.id)?;
        let message = self.store.record_message(
            conversation.id,
            NewMessage {
                content: body,
                media_url,
                direction: Direction::Outbound,
                whatsapp_message_id: Some(&sid),
            },
        )?;
        Ok(message)
    }

    /// Render a stored template with `context` and send it
    pub async fn send_template_message(
        &self,
        to: &str,
        template_name: &str,
        context: &Map<String, Value>,
    ) -> Result<Message> {
        let template = self
            .store
            .template(template_name)?
            .ok_or_else(|| WhatsAppError::TemplateNotFound(template_name.to_string()))?;
        let content = template.render(context);
        self.send_message(to, &content, None).await
    }

    /// Queue a conversation for a human agent.
    /// Returns the ticket, or `None` when it was not handled by the bot.
    pub fn request_human_support(&self, conversation_id: i64) -> Result<Option<SupportTicket>> {
        let mut conversation = self.store.conversation(conversation_id)?;
        if !conversation.request_human_support() {
            return Ok(None);
        }
        self.store.save_conversation(&conversation)?;

        let customer = self.store.customer(conversation.customer_id)?;
        let ticket = self
            .store
            .enqueue_support(conversation.id, &customer.phone_number)?;
        Ok(Some(ticket))
    }

    pub fn assign_human_agent(&self, conversation_id: i64, agent: &str) -> Result<Conversation> {
        let mut conversation = self.store.conversation(conversation_id)?;
        conversation.assign_human_agent(agent);
        self.store.save_conversation(&conversation)?;
        self.store.dequeue_support(conversation_id)?;
        info!("Conversation {} assigned to {}", conversation_id, agent);
        Ok(conversation)
    }

    pub fn return_to_bot(&self, conversation_id: i64) -> Result<Conversation> {
        let mut conversation = self.store.conversation(conversation_id)?;
        conversation.return_to_bot();
        self.store.save_conversation(&conversation)?;
        self.store.dequeue_support(conversation_id)?;
        info!("Conversation {} returned to the bot", conversation_id);
        Ok(conversation)
    }

    /// Start the bot (webhook and admin server)
    pub async fn start(
        self,
        port: u16,
        secret_key: Option<String>,
        signature_token: Option<String>,
        public_url: PublicUrl,
    ) -> Result<()> {
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();
        let server = WebhookServer::new(addr, Arc::new(self), secret_key, signature_token, public_url);
        server.start().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    use crate::handlers::{HandlerContext, MessageHandler};

    struct Echo;

    #[async_trait]
    impl MessageHandler for Echo {
        async fn process_message(
            &self,
            _from: &str,
            message: &str,
            _context: &HandlerContext,
        ) -> Result<Option<String>> {
            Ok(Some(format!("eco: {}", message)))
        }
    }

    /// Assistant that holds its reply until released
    #[derive(Default)]
    struct GatedAssistant {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl MessageHandler for GatedAssistant {
        async fn process_message(
            &self,
            _from: &str,
            _message: &str,
            _context: &HandlerContext,
        ) -> Result<Option<String>> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(Some("respuesta tardía".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_message(&self, to: &str, body: &str, _media_url: Option<&str>) -> Result<String> {
            self.sent.lock().unwrap().push((to.to_string(), body.to_string()));
            Ok("SM100".to_string())
        }
    }

    fn bot(sender: Option<Arc<dyn MessageSender>>) -> WhatsAppBot {
        let store = Arc::new(Store::in_memory().unwrap());
        let router = ConversationRouter::new(Arc::new(ChatbotHandler::new()), Arc::new(Echo));
        WhatsAppBot::new(store, router, sender)
    }

    fn incoming(body: &str) -> IncomingMessage {
        IncomingMessage {
            from: "whatsapp:+5491112345678".into(),
            to: "whatsapp:+14155238886".into(),
            body: body.into(),
            message_sid: "SM1".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_empty_body_is_not_recorded() {
        let bot = bot(None);
        let reply = bot.handle_incoming(&incoming("   ")).await.unwrap();
        assert_eq!(reply.as_deref(), Some(EMPTY_BODY_MESSAGE));
        assert!(bot.store.conversation_for_phone("+5491112345678").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reply_recorded_and_state_updated() {
        let bot = bot(None);
        let reply = bot.handle_incoming(&incoming("2")).await.unwrap().unwrap();
        assert!(reply.starts_with("Para hacer un pedido"));

        let conversation = bot
            .store
            .conversation_for_phone("+5491112345678")
            .unwrap()
            .unwrap();
        assert_eq!(conversation.current_state, bt_core::ConversationState::AddingToCart);
        assert_eq!(conversation.context_data["intent"], "hacer_pedido");

        let messages = bot.store.messages(conversation.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].direction, Direction::Outbound);
        assert_eq!(messages[1].content, reply);
    }

    #[tokio::test]
    async fn test_human_handoff_silences_bot() {
        let bot = bot(None);
        bot.handle_incoming(&incoming("hola")).await.unwrap();
        let conversation = bot
            .store
            .conversation_for_phone("+5491112345678")
            .unwrap()
            .unwrap();

        let ticket = bot.request_human_support(conversation.id).unwrap().unwrap();
        assert_eq!(ticket.phone_number, "+5491112345678");
        assert!(bot.request_human_support(conversation.id).unwrap().is_none());

        let waiting = bot.handle_incoming(&incoming("¿hola?")).await.unwrap();
        assert_eq!(waiting.as_deref(), Some(HUMAN_HANDOFF_MESSAGE));

        let assigned = bot.assign_human_agent(conversation.id, "lucia").unwrap();
        assert_eq!(assigned.handler_type, HandlerType::HumanActive);
        assert!(bot.store.support_queue().unwrap().is_empty());
        assert!(bot.handle_incoming(&incoming("¿sigue ahí?")).await.unwrap().is_none());

        bot.return_to_bot(conversation.id).unwrap();
        assert!(bot.handle_incoming(&incoming("hola")).await.unwrap().is_some());
        // 4 inbound + 3 outbound
        assert_eq!(bot.store.messages(conversation.id).unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_handoff_during_assistant_call_survives() {
        let gate = Arc::new(GatedAssistant::default());
        let store = Arc::new(Store::in_memory().unwrap());
        let router = ConversationRouter::new(Arc::new(ChatbotHandler::new()), gate.clone());
        let bot = Arc::new(WhatsAppBot::new(store.clone(), router, None));

        let handle = tokio::spawn({
            let bot = bot.clone();
            async move { bot.handle_incoming(&incoming("asdfgh qwerty")).await }
        });
        gate.started.notified().await;

        let conversation = store
            .conversation_for_phone("+5491112345678")
            .unwrap()
            .unwrap();
        bot.assign_human_agent(conversation.id, "lucia").unwrap();
        gate.release.notify_one();

        let reply = handle.await.unwrap().unwrap();
        assert_eq!(reply.as_deref(), Some("respuesta tardía"));

        let conversation = store.conversation(conversation.id).unwrap();
        assert_eq!(conversation.handler_type, HandlerType::HumanActive);
        assert_eq!(conversation.human_agent.as_deref(), Some("lucia"));
        assert_eq!(conversation.context_data["intent"], "desconocido");
    }

    #[tokio::test]
    async fn test_template_message() {
        let sender = Arc::new(RecordingSender::default());
        let dyn_sender: Arc<dyn MessageSender> = sender.clone();
        let bot = bot(Some(dyn_sender));

        let context = serde_json::json!({
            "order_number": "A-17",
            "total_amount": "3500.00",
            "status": "Confirmado"
        });
        let message = bot
            .send_template_message("+5491112345678", "order_confirmation", context.as_object().unwrap())
            .await
            .unwrap();
        assert_eq!(message.whatsapp_message_id.as_deref(), Some("SM100"));
        assert!(message.content.contains("#A-17"));
        assert!(message.content.contains("$3500.00"));

        let err = bot
            .send_template_message("+5491112345678", "missing", &Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WhatsAppError::TemplateNotFound(_)));
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_without_credentials() {
        let bot = bot(None);
        let err = bot.send_message("+1", "hola", None).await.unwrap_err();
        assert!(matches!(err, WhatsAppError::CredentialsNotSet));
    }
}
