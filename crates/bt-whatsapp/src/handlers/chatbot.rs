use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use bt_core::catalog::{self, CatalogService};
use bt_core::constants::{
    CUSTOMER_SUPPORT_MESSAGE, MAIN_MENU_MESSAGE, MAKE_ORDER_MESSAGE, ORDER_STATUS_MESSAGE,
    SPECIAL_OFFERS_MESSAGE, VIEW_PRODUCTS_MESSAGE, WELCOME_MESSAGE,
};
use bt_core::{Intent, Store};

use super::{HandlerContext, MessageHandler};
use crate::error::Result;

/// Canned replies for recognised intents
pub struct ChatbotHandler {
    store: Option<Arc<Store>>,
}

impl ChatbotHandler {
    /// Static replies only
    pub fn new() -> Self {
        Self { store: None }
    }

    /// Replies for products and offers come from the catalog when it has data
    pub fn with_catalog(store: Arc<Store>) -> Self {
        Self { store: Some(store) }
    }

    fn products_reply(&self) -> Result<String> {
        if let Some(store) = &self.store {
            let products = store.products()?;
            if !products.is_empty() {
                debug!("Rendering {} catalog products", products.len());
                return Ok(catalog::format_product_list(&products));
            }
        }
        Ok(VIEW_PRODUCTS_MESSAGE.to_string())
    }

    fn offers_reply(&self) -> Result<String> {
        if let Some(store) = &self.store {
            let offers = CatalogService::new(store).active_special_offers(Utc::now())?;
            if !offers.is_empty() {
                return Ok(catalog::format_special_offers(&offers));
            }
        }
        Ok(SPECIAL_OFFERS_MESSAGE.to_string())
    }
}

impl Default for ChatbotHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageHandler for ChatbotHandler {
    async fn process_message(
        &self,
        _from: &str,
        _message: &str,
        context: &HandlerContext,
    ) -> Result<Option<String>> {
        let Some(intent) = context.intent.map(|m| m.intent) else {
            return Ok(None);
        };

        let reply = match intent {
            Intent::Greeting => WELCOME_MESSAGE.to_string(),
            Intent::ViewProducts => self.products_reply()?,
            Intent::MakeOrder => MAKE_ORDER_MESSAGE.to_string(),
            Intent::OrderStatus => ORDER_STATUS_MESSAGE.to_string(),
            Intent::SpecialOffers => self.offers_reply()?,
            Intent::CustomerSupport => CUSTOMER_SUPPORT_MESSAGE.to_string(),
            Intent::MainMenu => MAIN_MENU_MESSAGE.to_string(),
            Intent::Unknown => return Ok(None),
        };
        Ok(Some(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bt_core::IntentMatch;
    use bt_core::models::{NewCategory, NewProduct};

    fn context(intent: Intent) -> HandlerContext {
        HandlerContext {
            intent: Some(IntentMatch {
                intent,
                confidence: 0.9,
            }),
            first_interaction: false,
        }
    }

    #[tokio::test]
    async fn test_static_replies() {
        let handler = ChatbotHandler::new();
        let reply = handler
            .process_message("+1", "hola", &context(Intent::Greeting))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some(WELCOME_MESSAGE));

        let reply = handler
            .process_message("+1", "productos", &context(Intent::ViewProducts))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some(VIEW_PRODUCTS_MESSAGE));
    }

    #[tokio::test]
    async fn test_declines_unknown_or_missing_intent() {
        let handler = ChatbotHandler::new();
        assert!(handler
            .process_message("+1", "xyz", &context(Intent::Unknown))
            .await
            .unwrap()
            .is_none());
        assert!(handler
            .process_message("+1", "xyz", &HandlerContext::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_products_from_catalog() {
        let store = Arc::new(Store::in_memory().unwrap());
        let handler = ChatbotHandler::with_catalog(Arc::clone(&store));

        // Empty catalog keeps the static text
        let reply = handler
            .process_message("+1", "productos", &context(Intent::ViewProducts))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some(VIEW_PRODUCTS_MESSAGE));

        let category = store
            .create_category(&NewCategory {
                name: "Milanesas".into(),
                description: None,
            })
            .unwrap();
        store
            .create_product(&NewProduct {
                name: "Napolitana".into(),
                description: "Con jamón y queso".into(),
                price_cents: 250_000,
                category_id: category.id,
                stock: 4,
                image_url: None,
                featured: true,
            })
            .unwrap();

        let reply = handler
            .process_message("+1", "productos", &context(Intent::ViewProducts))
            .await
            .unwrap()
            .unwrap();
        assert!(reply.starts_with("📋 *PRODUCTOS DISPONIBLES*"));
        assert!(reply.contains("*Napolitana*"));

        let offers = handler
            .process_message("+1", "ofertas", &context(Intent::SpecialOffers))
            .await
            .unwrap();
        assert_eq!(offers.as_deref(), Some(SPECIAL_OFFERS_MESSAGE));
    }
}
