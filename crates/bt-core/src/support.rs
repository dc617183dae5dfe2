//! Customer support: category detection and canned answers

use tracing::info;

use crate::constants::{BACK_KEYWORDS, MAIN_MENU_KEYWORDS};

/// Footer appended to every support answer
pub const RETURN_TO_MENU_HINT: &str = "\n\nPara volver al menú principal, escribe 'menu' o 'volver'.";

/// Category used when no keyword matches
pub const DEFAULT_CATEGORY: &str = "default";

/// Support categories in tie-break order, with their keywords and answer
const SUPPORT_CATEGORIES: &[(&str, &[&str], &str)] = &[
    (
        "pedido",
        &[
            "pedido", "orden", "compra", "tracking", "seguimiento", "estado", "cancelar",
            "modificar", "cambiar",
        ],
        "Entiendo que tienes una consulta sobre tu pedido. \
         Para ayudarte mejor, necesito el número de pedido. \
         Por favor, envíame el número que recibiste en tu confirmación de compra.\n\n\
         Si no tienes el número, puedes proporcionarme la fecha aproximada \
         y tu nombre completo para buscar tu pedido.",
    ),
    (
        "producto",
        &[
            "producto", "calidad", "ingredientes", "alérgenos", "alergenos", "conservación",
            "conservacion", "caducidad", "vencimiento",
        ],
        "Gracias por tu interés en nuestros productos. \
         Todas nuestras milanesas son elaboradas con ingredientes frescos y de alta calidad. \
         Si tienes alguna consulta específica sobre ingredientes, alérgenos o \
         métodos de conservación, por favor háznoslo saber y te proporcionaremos \
         la información detallada.",
    ),
    (
        "pago",
        &[
            "pago", "factura", "recibo", "tarjeta", "efectivo", "transferencia", "mercadopago",
            "reembolso", "devolucion", "devolución",
        ],
        "Respecto a tu consulta sobre pagos, aceptamos múltiples formas de pago:\n\
         - Efectivo (solo en entregas a domicilio)\n\
         - Tarjetas de débito y crédito\n\
         - Transferencia bancaria\n\
         - MercadoPago\n\n\
         Si tienes alguna consulta específica sobre facturación o reembolsos, \
         por favor proporciona más detalles para poder ayudarte mejor.",
    ),
    (
        "envio",
        &[
            "envío", "envio", "delivery", "entrega", "dirección", "direccion", "domicilio",
            "tiempo", "demora", "retraso",
        ],
        "Sobre nuestro servicio de envío:\n\
         - Realizamos entregas en toda la ciudad\n\
         - El costo estándar es de $500\n\
         - Envío gratis en compras superiores a $5000\n\
         - Tiempo estimado de entrega: 30-45 minutos dependiendo de la zona\n\n\
         Si necesitas información sobre el estado de tu envío, por favor \
         proporciona tu número de pedido.",
    ),
    (
        "horario",
        &[
            "horario", "abierto", "cerrado", "atención", "atencion", "disponibilidad", "días",
            "dias", "horas",
        ],
        "Nuestro horario de atención es:\n\
         - Lunes a viernes: 9:00 a 20:00 hs\n\
         - Sábados: 9:00 a 14:00 hs\n\
         - Domingos: Cerrado\n\n\
         Los pedidos realizados fuera del horario de atención serán procesados \
         al siguiente día hábil.",
    ),
    (
        "reclamo",
        &[
            "reclamo", "queja", "problema", "error", "incidencia", "incidente", "insatisfecho",
            "insatisfecha", "mal", "defectuoso",
        ],
        "Lamentamos mucho que hayas tenido un problema. Tu satisfacción es \
         nuestra prioridad y queremos resolverlo lo antes posible.\n\n\
         Por favor, describe detalladamente el inconveniente que tuviste, \
         incluyendo el número de pedido si lo tienes disponible. \
         Un representante de atención al cliente se pondrá en contacto contigo \
         a la brevedad.",
    ),
];

const DEFAULT_RESPONSE: &str = "Gracias por contactar a nuestro servicio de atención al cliente. \
     Estamos aquí para ayudarte con cualquier consulta o problema que tengas. \
     Por favor, proporciona más detalles sobre tu consulta para que podamos \
     asistirte mejor.";

/// Pick the support category with the most keyword hits.
///
/// Keywords match as substrings of the lower-cased message. Ties go to the
/// category listed first. Returns `("default", 0.1)` when nothing matches.
pub fn detect_support_category(message: &str) -> (&'static str, f64) {
    let message = message.to_lowercase();

    let mut best: Option<(&'static str, usize)> = None;
    for (category, keywords, _) in SUPPORT_CATEGORIES {
        let matches = keywords.iter().filter(|kw| message.contains(*kw)).count();
        if matches > 0 && best.is_none_or(|(_, top)| matches > top) {
            best = Some((*category, matches));
        }
    }

    match best {
        Some((category, matches)) => (category, (0.3 + matches as f64 * 0.15).min(0.9)),
        None => (DEFAULT_CATEGORY, 0.1),
    }
}

/// Canned answer for the message's support category, with the menu hint
pub fn get_support_response(message: &str) -> String {
    let (category, confidence) = detect_support_category(message);
    info!(
        "Support category detected: {} with confidence {:.2}",
        category, confidence
    );

    let body = SUPPORT_CATEGORIES
        .iter()
        .find(|(name, _, _)| *name == category)
        .map(|(_, _, response)| *response)
        .unwrap_or(DEFAULT_RESPONSE);

    format!("{}{}", body, RETURN_TO_MENU_HINT)
}

/// Whether the customer wants to leave support and go back to the menu.
///
/// Back keywords match anywhere in the message; main-menu keywords only as
/// the whole message, so "menu" or "volver" work on their own.
pub fn is_returning_to_menu(message: &str) -> bool {
    let message = message.to_lowercase();
    let trimmed = message.trim();
    BACK_KEYWORDS.iter().any(|kw| message.contains(kw)) || MAIN_MENU_KEYWORDS.contains(&trimmed)
}
