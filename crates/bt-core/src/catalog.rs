//! Catalog queries and their WhatsApp-formatted renderings

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;
use crate::models::{Category, Product, SpecialOffer};
use crate::store::Store;

/// A current offer with the active products it applies to
#[derive(Debug, Clone, Serialize)]
pub struct OfferWithProducts {
    pub offer: SpecialOffer,
    pub products: Vec<Product>,
}

/// Read-side catalog access used by the chatbot and the admin API
pub struct CatalogService<'a> {
    store: &'a Store,
}

impl<'a> CatalogService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn categories(&self) -> Result<Vec<Category>> {
        self.store.categories()
    }

    pub fn products_by_category(&self, category_id: i64) -> Result<Vec<Product>> {
        self.store.products_by_category(category_id)
    }

    pub fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        self.store.search_products(query)
    }

    pub fn product_details(&self, product_id: i64) -> Result<Option<Product>> {
        let product = self.store.product(product_id)?;
        if product.is_none() {
            tracing::warn!("Product {} not found", product_id);
        }
        Ok(product)
    }

    /// Offers that are active and inside their validity window at `now`
    pub fn active_special_offers(&self, now: DateTime<Utc>) -> Result<Vec<OfferWithProducts>> {
        let mut current = Vec::new();
        for offer in self.store.active_offers()? {
            if !offer.is_current(now) {
                continue;
            }
            let mut products = Vec::with_capacity(offer.product_ids.len());
            for id in &offer.product_ids {
                if let Some(product) = self.store.product(*id)? {
                    products.push(product);
                }
            }
            current.push(OfferWithProducts { offer, products });
        }
        Ok(current)
    }
}

fn availability(product: &Product) -> &'static str {
    if product.is_available() {
        "✅ Disponible"
    } else {
        "❌ No disponible"
    }
}

pub fn format_product_list(products: &[Product]) -> String {
    if products.is_empty() {
        return "No se encontraron productos disponibles.".to_string();
    }

    let mut result = String::from("📋 *PRODUCTOS DISPONIBLES*\n\n");
    for (i, product) in products.iter().enumerate() {
        result.push_str(&format!(
            "{}. *{}*\n   💰 ${:.2}\n   {}\n\n",
            i + 1,
            product.name,
            product.price(),
            availability(product)
        ));
    }
    result.push_str(
        "Para ver detalles de un producto, responde con el número o nombre del producto.",
    );
    result
}

pub fn format_product_detail(product: Option<&Product>) -> String {
    let Some(product) = product else {
        return "Lo siento, no se encontró información del producto solicitado.".to_string();
    };

    let mut result = format!(
        "🔍 *DETALLE DEL PRODUCTO*\n\n\
         *{}*\n\n\
         💰 *Precio:* ${:.2}\n\
         📦 *Categoría:* {}\n\
         🔢 *Stock:* {}\n\
         📊 *Estado:* {}\n\n\
         📝 *Descripción:*\n{}\n\n",
        product.name,
        product.price(),
        product.category_name,
        product.stock,
        availability(product),
        product.description
    );

    if let Some(url) = product.image_url.as_deref().filter(|url| !url.is_empty()) {
        result.push_str(&format!("🖼️ *Imagen:* {}\n\n", url));
    }

    result.push_str(
        "Para agregar este producto a tu carrito, responde con:\n\
         \"Agregar [cantidad] [nombre del producto]\"\n\n\
         Para volver al catálogo, escribe \"volver\".",
    );
    result
}

pub fn format_special_offers(offers: &[OfferWithProducts]) -> String {
    if offers.is_empty() {
        return "Actualmente no hay ofertas especiales disponibles.".to_string();
    }

    let mut result = String::from("🔥 *OFERTAS ESPECIALES* 🔥\n\n");
    for (i, entry) in offers.iter().enumerate() {
        let offer = &entry.offer;
        // `{:?}` keeps the decimal point on whole percentages ("30.0")
        result.push_str(&format!(
            "{}. *{}*\n   {}\n   🏷️ *Descuento:* {:?}%\n   🎫 *Código:* {}\n\n   *Productos en oferta:*\n",
            i + 1,
            offer.title,
            offer.description,
            offer.discount_percent,
            offer.code
        ));

        for (j, product) in entry.products.iter().enumerate() {
            result.push_str(&format!(
                "   {}. {}\n      Precio original: ${:.2}\n      Precio oferta: ${:.2}\n\n",
                j + 1,
                product.name,
                product.price(),
                offer.discounted_price(product)
            ));
        }
    }
    result.push_str("Para aprovechar una oferta, responde con el código de la oferta.");
    result
}
