use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{Store, now_rfc3339, parse_ts};
use crate::models::{Category, NewCategory, NewProduct, NewSpecialOffer, Product, SpecialOffer};
use crate::{Error, Result};

const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.description, p.price_cents, p.category_id, \
     c.name, p.stock, p.image_url, p.active, p.featured \
     FROM products p JOIN categories c ON c.id = p.category_id";

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        active: row.get(3)?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price_cents: row.get(3)?,
        category_id: row.get(4)?,
        category_name: row.get(5)?,
        stock: row.get(6)?,
        image_url: row.get(7)?,
        active: row.get(8)?,
        featured: row.get(9)?,
    })
}

fn offer_from_row(row: &Row<'_>) -> rusqlite::Result<SpecialOffer> {
    Ok(SpecialOffer {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        discount_percent: row.get(3)?,
        starts_at: parse_ts(4, row.get(4)?)?,
        ends_at: parse_ts(5, row.get(5)?)?,
        code: row.get(6)?,
        active: row.get(7)?,
        product_ids: Vec::new(),
    })
}

fn query_products(conn: &Connection, filter: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<Product>> {
    let sql = format!("{} WHERE {} ORDER BY p.id", PRODUCT_SELECT, filter);
    let mut stmt = conn.prepare(&sql)?;
    let products = stmt
        .query_map(params, product_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(products)
}

fn offer_product_ids(conn: &Connection, offer_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT product_id FROM special_offer_products WHERE offer_id = ?1 ORDER BY product_id",
    )?;
    let ids = stmt
        .query_map(params![offer_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

impl Store {
    pub fn create_category(&self, category: &NewCategory) -> Result<Category> {
        if category.name.trim().is_empty() {
            return Err(Error::Validation("category name is required".to_string()));
        }
        let conn = self.conn()?;
        let now = now_rfc3339();
        conn.execute(
            "INSERT INTO categories (name, description, active, created_at, updated_at)
             VALUES (?1, ?2, 1, ?3, ?3)",
            params![category.name, category.description, now],
        )?;
        Ok(conn.query_row(
            "SELECT id, name, description, active FROM categories WHERE id = ?1",
            params![conn.last_insert_rowid()],
            category_from_row,
        )?)
    }

    /// Active categories
    pub fn categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, description, active FROM categories WHERE active = 1 ORDER BY id",
        )?;
        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    pub fn create_product(&self, product: &NewProduct) -> Result<Product> {
        if product.name.trim().is_empty() {
            return Err(Error::Validation("product name is required".to_string()));
        }
        if product.price_cents < 0 {
            return Err(Error::Validation("price must not be negative".to_string()));
        }
        let id = {
            let conn = self.conn()?;
            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO products
                    (name, description, price_cents, category_id, stock, image_url, active,
                     featured, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?8)",
                params![
                    product.name,
                    product.description,
                    product.price_cents,
                    product.category_id,
                    product.stock,
                    product.image_url,
                    product.featured,
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };
        self.product(id)?
            .ok_or_else(|| Error::NotFound(format!("product {}", id)))
    }

    /// Active products of a category
    pub fn products_by_category(&self, category_id: i64) -> Result<Vec<Product>> {
        let conn = self.conn()?;
        query_products(&conn, "p.category_id = ?1 AND p.active = 1", &[&category_id])
    }

    /// Every active product
    pub fn products(&self) -> Result<Vec<Product>> {
        let conn = self.conn()?;
        query_products(&conn, "p.active = 1", &[])
    }

    /// Active products whose name or description contains `query`, ignoring case
    pub fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let conn = self.conn()?;
        let pattern = format!("%{}%", query.to_lowercase());
        query_products(
            &conn,
            "p.active = 1 AND (lower(p.name) LIKE ?1 OR lower(p.description) LIKE ?1)",
            &[&pattern],
        )
    }

    /// An active product by id
    pub fn product(&self, id: i64) -> Result<Option<Product>> {
        let conn = self.conn()?;
        let sql = format!("{} WHERE p.id = ?1 AND p.active = 1", PRODUCT_SELECT);
        Ok(conn.query_row(&sql, params![id], product_from_row).optional()?)
    }

    pub fn create_offer(&self, offer: &NewSpecialOffer) -> Result<SpecialOffer> {
        if !(0.0..=100.0).contains(&offer.discount_percent) {
            return Err(Error::Validation(
                "discount_percent must be between 0 and 100".to_string(),
            ));
        }
        if offer.ends_at < offer.starts_at {
            return Err(Error::Validation("offer ends before it starts".to_string()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO special_offers
                (title, description, discount_percent, starts_at, ends_at, code, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
            params![
                offer.title,
                offer.description,
                offer.discount_percent,
                offer.starts_at.to_rfc3339(),
                offer.ends_at.to_rfc3339(),
                offer.code,
            ],
        )?;
        let id = tx.last_insert_rowid();
        for product_id in &offer.product_ids {
            tx.execute(
                "INSERT OR IGNORE INTO special_offer_products (offer_id, product_id) VALUES (?1, ?2)",
                params![id, product_id],
            )?;
        }
        let mut created = tx.query_row(
            "SELECT id, title, description, discount_percent, starts_at, ends_at, code, active
             FROM special_offers WHERE id = ?1",
            params![id],
            offer_from_row,
        )?;
        created.product_ids = offer_product_ids(&tx, id)?;
        tx.commit()?;
        Ok(created)
    }

    /// Active offers with their product ids; callers filter by validity window
    pub fn active_offers(&self) -> Result<Vec<SpecialOffer>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, discount_percent, starts_at, ends_at, code, active
             FROM special_offers WHERE active = 1 ORDER BY id",
        )?;
        let mut offers = stmt
            .query_map([], offer_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for offer in &mut offers {
            offer.product_ids = offer_product_ids(&conn, offer.id)?;
        }
        Ok(offers)
    }
}
