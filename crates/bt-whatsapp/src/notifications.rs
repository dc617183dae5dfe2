//! Order notifications sent from stored templates

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use bt_core::Message;

use crate::bot::WhatsAppBot;
use crate::error::Result;

pub const ORDER_CONFIRMATION_TEMPLATE: &str = "order_confirmation";
pub const DELIVERY_UPDATE_TEMPLATE: &str = "delivery_update";

/// Shown when a delivery update carries no estimate
const UNKNOWN_DELIVERY_ESTIMATE: &str = "Soon";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[default]
    Confirmation,
    Delivery,
}

/// Order details needed by the notification templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderNotification {
    pub phone: String,
    pub order_number: String,
    pub total_amount: f64,
    pub status: String,
    #[serde(default)]
    pub estimated_delivery: Option<String>,
    #[serde(default)]
    pub kind: NotificationKind,
}

impl OrderNotification {
    pub fn template_name(&self) -> &'static str {
        match self.kind {
            NotificationKind::Confirmation => ORDER_CONFIRMATION_TEMPLATE,
            NotificationKind::Delivery => DELIVERY_UPDATE_TEMPLATE,
        }
    }

    /// Placeholder values for the template
    pub fn context(&self) -> Map<String, Value> {
        let mut context = Map::new();
        context.insert("order_number".into(), self.order_number.clone().into());
        context.insert("status".into(), self.status.clone().into());
        match self.kind {
            NotificationKind::Confirmation => {
                context.insert(
                    "total_amount".into(),
                    format!("{:.2}", self.total_amount).into(),
                );
            }
            NotificationKind::Delivery => {
                let estimate = self
                    .estimated_delivery
                    .clone()
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_DELIVERY_ESTIMATE.to_string());
                context.insert("estimated_delivery".into(), estimate.into());
            }
        }
        context
    }
}

impl WhatsAppBot {
    pub async fn send_order_notification(&self, notification: &OrderNotification) -> Result<Message> {
        self.send_template_message(
            &notification.phone,
            notification.template_name(),
            &notification.context(),
        )
        .await
    }

    pub async fn send_order_confirmation(
        &self,
        phone: &str,
        order_number: &str,
        total_amount: f64,
        status: &str,
    ) -> Result<Message> {
        self.send_order_notification(&OrderNotification {
            phone: phone.to_string(),
            order_number: order_number.to_string(),
            total_amount,
            status: status.to_string(),
            estimated_delivery: None,
            kind: NotificationKind::Confirmation,
        })
        .await
    }

    pub async fn send_delivery_update(
        &self,
        phone: &str,
        order_number: &str,
        status: &str,
        estimated_delivery: Option<&str>,
    ) -> Result<Message> {
        self.send_order_notification(&OrderNotification {
            phone: phone.to_string(),
            order_number: order_number.to_string(),
            total_amount: 0.0,
            status: status.to_string(),
            estimated_delivery: estimated_delivery.map(str::to_string),
            kind: NotificationKind::Delivery,
        })
        .await
    }
}
