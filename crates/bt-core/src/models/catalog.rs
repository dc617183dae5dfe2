//! Product catalog types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// Price in cents
    pub price_cents: i64,
    pub category_id: i64,
    /// Category name, joined in by the store
    pub category_name: String,
    pub stock: u32,
    pub image_url: Option<String>,
    pub active: bool,
    pub featured: bool,
}

impl Product {
    pub fn is_available(&self) -> bool {
        self.active && self.stock > 0
    }

    pub fn price(&self) -> f64 {
        self.price_cents as f64 / 100.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialOffer {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub discount_percent: f64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub code: String,
    pub active: bool,
    pub product_ids: Vec<i64>,
}

impl SpecialOffer {
    /// Active and `now` falls inside the offer window (both ends inclusive)
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.active && self.starts_at <= now && now <= self.ends_at
    }

    /// Price after the discount, in currency units
    pub fn discounted_price(&self, product: &Product) -> f64 {
        product.price() * (1.0 - self.discount_percent / 100.0)
    }
}

/// Input for creating a category
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for creating a product
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub category_id: i64,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
}

/// Input for creating a special offer
#[derive(Debug, Clone, Deserialize)]
pub struct NewSpecialOffer {
    pub title: String,
    pub description: String,
    pub discount_percent: f64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub code: String,
    #[serde(default)]
    pub product_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn product(stock: u32, active: bool) -> Product {
        Product {
            id: 1,
            name: "Milanesa de pollo".into(),
            description: "Rebozada".into(),
            price_cents: 150_000,
            category_id: 1,
            category_name: "Milanesas".into(),
            stock,
            image_url: None,
            active,
            featured: false,
        }
    }

    #[test]
    fn test_product_availability() {
        assert!(product(3, true).is_available());
        assert!(!product(0, true).is_available());
        assert!(!product(3, false).is_available());
    }

    #[test]
    fn test_offer_window_is_inclusive() {
        let now = Utc::now();
        let mut offer = SpecialOffer {
            id: 1,
            title: "Martes".into(),
            description: "2x1".into(),
            discount_percent: 20.0,
            starts_at: now,
            ends_at: now + Duration::days(1),
            code: "MARTES".into(),
            active: true,
            product_ids: vec![1],
        };
        assert!(offer.is_current(now));
        assert!(offer.is_current(now + Duration::days(1)));
        assert!(!offer.is_current(now - Duration::seconds(1)));

        offer.active = false;
        assert!(!offer.is_current(now));
    }

    #[test]
    fn test_discounted_price() {
        let now = Utc::now();
        let offer = SpecialOffer {
            id: 1,
            title: "Promo".into(),
            description: String::new(),
            discount_percent: 25.0,
            starts_at: now,
            ends_at: now,
            code: "P25".into(),
            active: true,
            product_ids: vec![],
        };
        assert!((offer.discounted_price(&product(1, true)) - 1125.0).abs() < 1e-9);
    }
}
