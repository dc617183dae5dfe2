use bt_core::intent::UNKNOWN_CONFIDENCE;
use bt_core::{ConversationState, Intent, detect_intent};

use crate::logged::LoggedCase;
use crate::runner::{CaseResult, Suite};

pub fn suite() -> Suite {
    Suite::new("test_intent_detection")
        .case("test_products_request", products_request)
        .case("test_unknown_message", unknown_message)
        .case("test_single_keyword_confidence", single_keyword_confidence)
        .case("test_menu_options", menu_options)
}

fn products_request(case: &LoggedCase) -> CaseResult {
    case.log_step("Detecting intent for a catalog request");
    let result = detect_intent("quiero ver productos del catalogo de milanesas");
    case.assert_equal_with_log(
        result.intent,
        Intent::ViewProducts,
        "Catalog request should map to ver_productos",
        None,
    );
    case.assert_with_log(
        result.confidence >= 0.65,
        "Confidence should clear the chatbot threshold",
        Some("Chatbot will answer"),
    );
    Ok(())
}

fn unknown_message(case: &LoggedCase) -> CaseResult {
    let result = detect_intent("xyz");
    case.assert_equal_with_log(result.intent, Intent::Unknown, "Gibberish is unknown", None);
    case.assert_equal_with_log(
        result.confidence,
        UNKNOWN_CONFIDENCE,
        "Unknown intent has the floor confidence",
        None,
    );
    Ok(())
}

fn single_keyword_confidence(case: &LoggedCase) -> CaseResult {
    let result = detect_intent("hola");
    case.assert_equal_with_log(result.intent, Intent::Greeting, "hola is a greeting", None);
    case.assert_with_log(
        (result.confidence - 0.3).abs() < 1e-9,
        "One keyword scores 0.3",
        None,
    );
    Ok(())
}

fn menu_options(case: &LoggedCase) -> CaseResult {
    let expected = [
        ("1", ConversationState::BrowsingProducts),
        ("2", ConversationState::AddingToCart),
        ("3", ConversationState::OrderStatus),
        ("4", ConversationState::SpecialOffers),
        ("5", ConversationState::CustomerSupport),
    ];
    for (option, state) in expected {
        case.log_step(&format!("Menu option {}", option));
        let result = detect_intent(option);
        case.assert_equal_with_log(
            result.intent.target_state(),
            Some(state),
            &format!("Option {} leads to {}", option, state.as_str()),
            None,
        );
    }
    Ok(())
}
