//! Keyword lists, menu options and canned replies used by the conversation handlers
//!
//! Customer-facing text is Spanish (Rioplatense), matching the shop's audience.

// ============================================================================
// Menu options
// ============================================================================

pub const MENU_VIEW_PRODUCTS: &str = "1";
pub const MENU_MAKE_ORDER: &str = "2";
pub const MENU_ORDER_STATUS: &str = "3";
pub const MENU_SPECIAL_OFFERS: &str = "4";
pub const MENU_CUSTOMER_SUPPORT: &str = "5";

// ============================================================================
// Intent confidence thresholds
// ============================================================================

pub const INTENT_HIGH_CONFIDENCE: f64 = 0.85;
pub const INTENT_MEDIUM_CONFIDENCE: f64 = 0.65;
pub const INTENT_LOW_CONFIDENCE: f64 = 0.40;

// ============================================================================
// Keyword groups
// ============================================================================

pub const GREETING_KEYWORDS: &[&str] = &[
    "hola", "buen día", "buen dia", "buenos días", "buenos dias",
    "buenas tardes", "buenas noches", "qué tal", "que tal", "cómo va", "como va",
    "qué onda", "que onda", "holis", "saludos",
];

pub const MAIN_MENU_KEYWORDS: &[&str] = &[
    "menu", "menú", "principal", "volver al menú", "volver al menu",
    "menú principal", "menu principal", "inicio", "volver",
];

pub const VIEW_PRODUCTS_KEYWORDS: &[&str] = &[
    "ver producto", "ver productos", "productos", "catalogo", "catálogo", "milanesas",
    "que tenés para vender", "que tenes para vender", "mostrame los productos",
    "quiero ver productos", "quisiera ver productos", "menú de productos", "menu de productos",
    "que vendés", "que vendes", "mostrame las opciones",
];

pub const MAKE_ORDER_KEYWORDS: &[&str] = &[
    "hacer pedido", "hacer un pedido", "quiero comprar", "quisiera comprar",
    "quiero pedir", "quisiera pedir", "quiero ordenar", "quisiera ordenar",
    "realizar pedido", "realizar compra", "me gustaría comprar", "me gustaria comprar",
    "me gustaría pedir", "me gustaria pedir",
];

pub const ORDER_STATUS_KEYWORDS: &[&str] = &[
    "consultar estado", "estado de mi pedido", "seguimiento de pedido", "mi pedido",
    "donde está mi pedido", "donde esta mi pedido", "cuando llega mi pedido",
    "cuándo llega mi pedido", "tracking de mi pedido", "rastreo de pedido",
    "revisar pedido", "cómo va mi pedido", "como va mi pedido",
    "estado de mi compra", "estado de mi orden",
];

pub const SPECIAL_OFFERS_KEYWORDS: &[&str] = &[
    "ofertas", "promociones", "descuentos", "ofertas especiales", "promociones especiales",
    "promo", "combos especiales", "paquetes con descuento", "liquidación", "liquidacion",
    "ofertas del día", "ofertas del dia", "promociones del día", "promociones del dia",
    "hay descuentos", "tienen ofertas",
];

pub const CUSTOMER_SUPPORT_KEYWORDS: &[&str] = &[
    "atención al cliente", "atencion al cliente", "servicio al cliente",
    "hablar con alguien", "hablar con una persona", "hablar con un representante",
    "necesito ayuda", "tengo un problema", "tengo una duda", "tengo una pregunta",
    "quiero hablar con un humano", "quiero hablar con una persona",
    "contactar con soporte", "contactar con atención",
];

pub const BACK_KEYWORDS: &[&str] = &[
    "volver atrás", "volver atras", "ir atrás", "ir atras", "regresar",
    "volver a categorías", "volver a categorias", "atrás", "atras",
];

// ============================================================================
// Canned replies
// ============================================================================

macro_rules! main_menu_options {
    () => {
        "1️⃣ Ver productos\n\
         2️⃣ Hacer un pedido\n\
         3️⃣ Consultar estado de pedido\n\
         4️⃣ Ver ofertas especiales\n\
         5️⃣ Hablar con atención al cliente"
    };
}

macro_rules! main_menu_message {
    () => {
        concat!("Menú Principal:\n\n", main_menu_options!())
    };
}

pub const WELCOME_MESSAGE: &str = concat!(
    "¡Hola! En Breaders te solucionamos el almuerzo y la cena 🍽️.\n",
    "¿Estás listo/a para hacer tu pedido o tenés alguna consulta?\n\n",
    main_menu_options!()
);

pub const MAIN_MENU_MESSAGE: &str = main_menu_message!();

pub const VIEW_PRODUCTS_MESSAGE: &str = "Estos son nuestros productos disponibles:\n\n\
    🥖 Milanesas de carne\n\
    🥖 Milanesas de pollo\n\
    🥖 Milanesas de cerdo\n\
    🥖 Milanesas vegetarianas\n\n\
    Responde con el nombre del producto para ver más detalles.";

pub const MAKE_ORDER_MESSAGE: &str = "Para hacer un pedido, primero selecciona el producto que deseas:\n\n\
    🥖 Milanesas de carne\n\
    🥖 Milanesas de pollo\n\
    🥖 Milanesas de cerdo\n\
    🥖 Milanesas vegetarianas\n\n\
    Responde con el nombre del producto para agregarlo a tu carrito.";

pub const ORDER_STATUS_MESSAGE: &str = "Para consultar el estado de tu pedido, necesito el número de pedido. \
    Por favor, envíame el número de pedido que recibiste en tu confirmación.";

pub const SPECIAL_OFFERS_MESSAGE: &str = "¡Tenemos estas ofertas especiales para vos!\n\n\
    🔥 2x1 en milanesas de pollo los martes\n\
    🔥 30% de descuento en tu primera compra\n\
    🔥 Envío gratis en pedidos mayores a $5000\n\n\
    ¿Te interesa alguna de estas ofertas?";

pub const CUSTOMER_SUPPORT_MESSAGE: &str = "Estás en el área de atención al cliente. \
    Por favor, describe tu consulta o problema y te ayudaremos lo antes posible.";

pub const NOT_UNDERSTOOD_MESSAGE: &str = concat!(
    "Lo siento, no entendí tu mensaje. ¿Podrías reformularlo o elegir una opción del menú?\n\n",
    main_menu_message!()
);

pub const ERROR_MESSAGE: &str =
    "Lo siento, ocurrió un error al procesar tu solicitud. Por favor, intenta nuevamente más tarde.";

/// Reply when the webhook itself fails, before or after routing
pub const WEBHOOK_FAILURE_MESSAGE: &str =
    "Sorry, we're experiencing technical difficulties. Please try again later.";

/// Reply to a webhook call with an empty `Body`
pub const EMPTY_BODY_MESSAGE: &str = "I couldn't understand your message. Please try again.";

/// Sent while a human agent owns the conversation and the customer writes again
pub const HUMAN_HANDOFF_MESSAGE: &str =
    "Un representante de atención al cliente te responderá a la brevedad. ¡Gracias por tu paciencia!";

// AI assistant fallbacks
pub const ASSISTANT_UNAVAILABLE_MESSAGE: &str =
    "Lo siento, el servicio de asistente AI no está disponible en este momento.";
pub const ASSISTANT_FAILED_MESSAGE: &str = "Lo siento, no pude procesar tu mensaje en este momento.";
pub const ASSISTANT_CONNECTION_MESSAGE: &str =
    "Lo siento, hay un problema de conexión con nuestro asistente.";
pub const ASSISTANT_UNEXPECTED_MESSAGE: &str = "Lo siento, ocurrió un error inesperado.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menus_share_options() {
        assert!(WELCOME_MESSAGE.ends_with("5️⃣ Hablar con atención al cliente"));
        assert!(MAIN_MENU_MESSAGE.starts_with("Menú Principal:\n\n1️⃣ Ver productos\n"));
        assert!(NOT_UNDERSTOOD_MESSAGE.ends_with(MAIN_MENU_MESSAGE));
    }

    #[test]
    fn test_line_continuations_keep_newlines() {
        assert!(VIEW_PRODUCTS_MESSAGE.contains("disponibles:\n\n🥖 Milanesas de carne\n🥖"));
        assert!(ORDER_STATUS_MESSAGE.contains("pedido. Por favor"));
    }
}
