//! Reusable message templates with `{placeholder}` markers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named message body with `{key}` placeholders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub name: String,
    pub content: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MessageTemplate {
    /// Replace every `{key}` with the matching context value.
    ///
    /// Strings are inserted verbatim, other JSON values in their JSON form.
    /// Placeholders without a context entry are left untouched.
    pub fn render(&self, context: &Map<String, Value>) -> String {
        render_placeholders(&self.content, context)
    }
}

fn render_placeholders(content: &str, context: &Map<String, Value>) -> String {
    let mut rendered = content.to_string();
    for (key, value) in context {
        let placeholder = format!("{{{}}}", key);
        let replacement = match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        rendered = rendered.replace(&placeholder, &replacement);
    }
    rendered
}

/// Templates installed by the initial migration
pub const DEFAULT_TEMPLATES: &[(&str, &str, &str)] = &[
    (
        "order_confirmation",
        "¡Gracias por tu compra! Tu pedido #{order_number} fue confirmado.\n\
         Total: ${total_amount}\n\
         Estado: {status}",
        "Sent when an order is confirmed",
    ),
    (
        "delivery_update",
        "Actualización de tu pedido #{order_number}: {status}.\n\
         Entrega estimada: {estimated_delivery}",
        "Sent when the delivery status changes",
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(content: &str) -> MessageTemplate {
        let now = Utc::now();
        MessageTemplate {
            name: "t".into(),
            content: content.into(),
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_render_without_context_returns_content() {
        let t = template("Hola {name}");
        assert_eq!(t.render(&Map::new()), "Hola {name}");
    }

    #[test]
    fn test_render_replaces_all_occurrences() {
        let t = template("{name}, tu pedido {order} está listo. Gracias {name}!");
        let ctx = json!({"name": "Ana", "order": 42});
        let rendered = t.render(ctx.as_object().unwrap());
        assert_eq!(rendered, "Ana, tu pedido 42 está listo. Gracias Ana!");
    }

    #[test]
    fn test_default_templates_have_placeholders() {
        let (_, content, _) = DEFAULT_TEMPLATES[0];
        assert!(content.contains("{order_number}"));
        assert!(content.contains("${total_amount}"));
    }
}
