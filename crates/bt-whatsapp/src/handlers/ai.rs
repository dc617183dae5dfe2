use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{HandlerContext, MessageHandler};
use crate::assistant::{AssistantApi, AssistantContext};
use crate::error::Result;

/// Forwards messages to the AI assistant with the detected intent as context
pub struct AssistantHandler {
    assistant: Arc<dyn AssistantApi>,
}

impl AssistantHandler {
    pub fn new(assistant: Arc<dyn AssistantApi>) -> Self {
        Self { assistant }
    }
}

#[async_trait]
impl MessageHandler for AssistantHandler {
    async fn process_message(
        &self,
        from: &str,
        message: &str,
        context: &HandlerContext,
    ) -> Result<Option<String>> {
        let preview: String = message.chars().take(50).collect();
        info!("Processing message with AI assistant: {}...", preview);

        // Only a real detection is worth passing along
        let assistant_context = context
            .intent
            .filter(|m| m.confidence > 0.0)
            .map(|m| AssistantContext {
                intent: m.intent.as_str(),
                confidence: m.confidence,
            });

        let reply = self
            .assistant
            .send_to_ai_assistant(
                message,
                from,
                assistant_context.as_ref(),
                context.first_interaction,
            )
            .await;
        Ok(Some(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_core::{Intent, IntentMatch};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAssistant {
        calls: Mutex<Vec<(String, Option<AssistantContext>, bool)>>,
    }

    #[async_trait]
    impl AssistantApi for RecordingAssistant {
        async fn send_to_ai_assistant(
            &self,
            message: &str,
            _from: &str,
            context: Option<&AssistantContext>,
            first_interaction: bool,
        ) -> String {
            self.calls
                .lock()
                .unwrap()
                .push((message.to_string(), context.cloned(), first_interaction));
            format!("eco: {}", message)
        }
    }

    #[tokio::test]
    async fn test_passes_intent_context() {
        let assistant = Arc::new(RecordingAssistant::default());
        let handler = AssistantHandler::new(assistant.clone());
        let context = HandlerContext {
            intent: Some(IntentMatch {
                intent: Intent::Unknown,
                confidence: 0.1,
            }),
            first_interaction: true,
        };

        let reply = handler.process_message("+1", "algo", &context).await.unwrap();
        assert_eq!(reply.as_deref(), Some("eco: algo"));

        let calls = assistant.calls.lock().unwrap();
        let (message, ctx, first) = &calls[0];
        assert_eq!(message, "algo");
        assert_eq!(ctx.unwrap().intent, "desconocido");
        assert!(*first);
    }

    #[tokio::test]
    async fn test_no_context_without_intent() {
        let assistant = Arc::new(RecordingAssistant::default());
        let handler = AssistantHandler::new(assistant.clone());
        handler
            .process_message("+1", "algo", &HandlerContext::default())
            .await
            .unwrap();
        assert!(assistant.calls.lock().unwrap()[0].1.is_none());
    }
}
