use bt_core::support::{
    DEFAULT_CATEGORY, RETURN_TO_MENU_HINT, detect_support_category, get_support_response,
    is_returning_to_menu,
};

use crate::logged::LoggedCase;
use crate::runner::{CaseResult, Suite};

pub fn suite() -> Suite {
    Suite::new("test_customer_support")
        .case("test_payment_question", payment_question)
        .case("test_default_category", default_category)
        .case("test_back_to_menu", back_to_menu)
}

fn payment_question(case: &LoggedCase) -> CaseResult {
    let (category, _) = detect_support_category("¿Puedo pagar con mercadopago?");
    case.assert_equal_with_log(category, "pago", "Payment keywords pick pago", None);

    let response = get_support_response("¿Puedo pagar con mercadopago?");
    case.assert_in_with_log(
        "MercadoPago",
        response.as_str(),
        "Answer lists the payment methods",
        None,
    );
    case.assert_with_log(
        response.ends_with(RETURN_TO_MENU_HINT),
        "Answer ends with the way back to the menu",
        None,
    );
    Ok(())
}

fn default_category(case: &LoggedCase) -> CaseResult {
    let (category, confidence) = detect_support_category("buenas");
    case.assert_equal_with_log(category, DEFAULT_CATEGORY, "No keyword falls back to default", None);
    case.assert_equal_with_log(confidence, 0.1, "Default category confidence", None);
    Ok(())
}

fn back_to_menu(case: &LoggedCase) -> CaseResult {
    for message in ["volver", "menu", "quiero ir atrás"] {
        case.assert_with_log(
            is_returning_to_menu(message),
            &format!("'{}' returns to the menu", message),
            None,
        );
    }
    case.assert_with_log(
        !is_returning_to_menu("mi pedido no llegó"),
        "A complaint stays in support",
        None,
    );
    Ok(())
}
