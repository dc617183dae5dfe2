//! Keyword-based intent detection for inbound messages

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::constants::{
    CUSTOMER_SUPPORT_KEYWORDS, GREETING_KEYWORDS, MAIN_MENU_KEYWORDS, MAKE_ORDER_KEYWORDS,
    MENU_CUSTOMER_SUPPORT, MENU_MAKE_ORDER, MENU_ORDER_STATUS, MENU_SPECIAL_OFFERS,
    MENU_VIEW_PRODUCTS, ORDER_STATUS_KEYWORDS, SPECIAL_OFFERS_KEYWORDS, VIEW_PRODUCTS_KEYWORDS,
};
use crate::models::ConversationState;

/// What the customer is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    #[serde(rename = "saludo")]
    Greeting,
    #[serde(rename = "ver_productos")]
    ViewProducts,
    #[serde(rename = "hacer_pedido")]
    MakeOrder,
    #[serde(rename = "consultar_estado")]
    OrderStatus,
    #[serde(rename = "ofertas_especiales")]
    SpecialOffers,
    #[serde(rename = "atencion_cliente")]
    CustomerSupport,
    #[serde(rename = "menu_principal")]
    MainMenu,
    #[serde(rename = "desconocido")]
    Unknown,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::Greeting => "saludo",
            Intent::ViewProducts => "ver_productos",
            Intent::MakeOrder => "hacer_pedido",
            Intent::OrderStatus => "consultar_estado",
            Intent::SpecialOffers => "ofertas_especiales",
            Intent::CustomerSupport => "atencion_cliente",
            Intent::MainMenu => "menu_principal",
            Intent::Unknown => "desconocido",
        }
    }

    pub fn is_known(self) -> bool {
        self != Intent::Unknown
    }

    /// State a conversation moves to once the bot answered this intent
    pub fn target_state(self) -> Option<ConversationState> {
        match self {
            Intent::Greeting => Some(ConversationState::Greeting),
            Intent::ViewProducts => Some(ConversationState::BrowsingProducts),
            Intent::MakeOrder => Some(ConversationState::AddingToCart),
            Intent::OrderStatus => Some(ConversationState::OrderStatus),
            Intent::SpecialOffers => Some(ConversationState::SpecialOffers),
            Intent::CustomerSupport => Some(ConversationState::CustomerSupport),
            Intent::MainMenu => Some(ConversationState::MainMenu),
            Intent::Unknown => None,
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detected intent with its confidence in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntentMatch {
    pub intent: Intent,
    pub confidence: f64,
}

/// Confidence for messages that match no keyword
pub const UNKNOWN_CONFIDENCE: f64 = 0.1;
/// Confidence for exact menu commands
pub const EXACT_COMMAND_CONFIDENCE: f64 = 1.0;

const KEYWORD_MATCH_WEIGHT: f64 = 0.3;
const MAX_KEYWORD_CONFIDENCE: f64 = 0.9;

/// Intents checked in priority order; the first pattern that matches wins
static INTENT_PATTERNS: LazyLock<Vec<(Intent, Regex)>> = LazyLock::new(|| {
    [
        (Intent::Greeting, GREETING_KEYWORDS),
        (Intent::ViewProducts, VIEW_PRODUCTS_KEYWORDS),
        (Intent::MakeOrder, MAKE_ORDER_KEYWORDS),
        (Intent::OrderStatus, ORDER_STATUS_KEYWORDS),
        (Intent::SpecialOffers, SPECIAL_OFFERS_KEYWORDS),
        (Intent::CustomerSupport, CUSTOMER_SUPPORT_KEYWORDS),
    ]
    .into_iter()
    .map(|(intent, keywords)| {
        let pattern = keyword_pattern(keywords);
        (intent, Regex::new(&pattern).expect("escaped keywords form a valid regex"))
    })
    .collect()
});

/// `\b(kw1|kw2|...)\b` with every keyword escaped
pub fn keyword_pattern(keywords: &[&str]) -> String {
    let escaped: Vec<String> = keywords.iter().map(|kw| regex::escape(kw)).collect();
    format!(r"\b({})\b", escaped.join("|"))
}

/// Classify a message.
///
/// Bare menu digits and main-menu keywords are exact commands. Otherwise the
/// first intent whose keywords appear wins, scored `0.3` per match up to `0.9`.
pub fn detect_intent(message: &str) -> IntentMatch {
    let message = message.to_lowercase();

    if let Some(intent) = exact_command(message.trim()) {
        return IntentMatch {
            intent,
            confidence: EXACT_COMMAND_CONFIDENCE,
        };
    }

    for (intent, pattern) in INTENT_PATTERNS.iter() {
        let matches = pattern.find_iter(&message).count();
        if matches > 0 {
            let confidence = (matches as f64 * KEYWORD_MATCH_WEIGHT).min(MAX_KEYWORD_CONFIDENCE);
            return IntentMatch {
                intent: *intent,
                confidence,
            };
        }
    }

    IntentMatch {
        intent: Intent::Unknown,
        confidence: UNKNOWN_CONFIDENCE,
    }
}

fn exact_command(message: &str) -> Option<Intent> {
    let intent = match message {
        MENU_VIEW_PRODUCTS => Intent::ViewProducts,
        MENU_MAKE_ORDER => Intent::MakeOrder,
        MENU_ORDER_STATUS => Intent::OrderStatus,
        MENU_SPECIAL_OFFERS => Intent::SpecialOffers,
        MENU_CUSTOMER_SUPPORT => Intent::CustomerSupport,
        other if MAIN_MENU_KEYWORDS.contains(&other) => Intent::MainMenu,
        _ => return None,
    };
    Some(intent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_products_request() {
        let result = detect_intent("quiero ver productos del catalogo de milanesas");
        assert_eq!(result.intent, Intent::ViewProducts);
        // "quiero ver productos", "catalogo" and "milanesas"
        assert!((result.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_single_keyword_scores_point_three() {
        let result = detect_intent("Hola");
        assert_eq!(result.intent, Intent::Greeting);
        assert!((result.confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_message() {
        let result = detect_intent("xyz");
        assert_eq!(result.intent, Intent::Unknown);
        assert_eq!(result.confidence, UNKNOWN_CONFIDENCE);
        assert!(result.intent.target_state().is_none());
    }

    #[test]
    fn test_priority_order() {
        // Greeting is checked before offers
        let result = detect_intent("hola, tienen ofertas?");
        assert_eq!(result.intent, Intent::Greeting);
    }

    #[test]
    fn test_keywords_need_word_boundaries() {
        assert_eq!(detect_intent("cholas").intent, Intent::Unknown);
    }

    #[test]
    fn test_menu_digits_are_exact_commands() {
        let result = detect_intent(" 4 ");
        assert_eq!(result.intent, Intent::SpecialOffers);
        assert_eq!(result.confidence, EXACT_COMMAND_CONFIDENCE);
        assert_eq!(detect_intent("5").intent, Intent::CustomerSupport);
        assert_eq!(detect_intent("6").intent, Intent::Unknown);
    }

    #[test]
    fn test_main_menu_keyword() {
        let result = detect_intent("Menú");
        assert_eq!(result.intent, Intent::MainMenu);
        assert_eq!(
            result.intent.target_state(),
            Some(ConversationState::MainMenu)
        );
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&Intent::OrderStatus).unwrap(),
            "\"consultar_estado\""
        );
        assert_eq!(Intent::Unknown.to_string(), "desconocido");
    }

    #[test]
    fn test_keyword_pattern_escapes() {
        assert_eq!(keyword_pattern(&["a.b", "c"]), r"\b(a\.b|c)\b");
    }
}
