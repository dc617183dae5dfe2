//! Versioned schema migrations tracked with `PRAGMA user_version`

use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::info;

use crate::{Error, Result};
use crate::models::DEFAULT_TEMPLATES;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "initial conversation schema",
        "CREATE TABLE customers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            phone_number TEXT NOT NULL UNIQUE,
            email TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
            current_state TEXT NOT NULL DEFAULT 'saludo',
            handler_type TEXT NOT NULL DEFAULT 'bot',
            human_agent TEXT,
            context_data TEXT NOT NULL DEFAULT '{}',
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_interaction TEXT NOT NULL
        );
        CREATE INDEX idx_conversations_customer ON conversations(customer_id, active);
        CREATE TABLE messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            content TEXT NOT NULL,
            media_url TEXT,
            direction TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            delivered INTEGER NOT NULL DEFAULT 0,
            read INTEGER NOT NULL DEFAULT 0,
            whatsapp_message_id TEXT
        );
        CREATE INDEX idx_messages_conversation ON messages(conversation_id, timestamp);
        CREATE TABLE message_templates (
            name TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE support_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
            phone_number TEXT NOT NULL,
            created_at TEXT NOT NULL
        );",
    ),
    (
        "product catalog",
        "CREATE TABLE categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            price_cents INTEGER NOT NULL,
            category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
            stock INTEGER NOT NULL DEFAULT 0,
            image_url TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            featured INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE special_offers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            discount_percent REAL NOT NULL DEFAULT 0,
            starts_at TEXT NOT NULL,
            ends_at TEXT NOT NULL,
            code TEXT NOT NULL UNIQUE,
            active INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE special_offer_products (
            offer_id INTEGER NOT NULL REFERENCES special_offers(id) ON DELETE CASCADE,
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            PRIMARY KEY (offer_id, product_id)
        );",
    ),
];

/// Schema version after every migration has run
pub(super) const LATEST_VERSION: u32 = MIGRATIONS.len() as u32;

pub(super) fn current_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

/// Apply every migration newer than the stored version, one transaction each
pub(super) fn migrate(conn: &mut Connection) -> Result<usize> {
    let stored = current_version(conn)?;
    if stored > LATEST_VERSION {
        return Err(Error::Config(format!(
            "Database schema version {} is newer than this build ({})",
            stored, LATEST_VERSION
        )));
    }
    let current = stored as usize;
    let mut applied = 0;

    for (index, (name, sql)) in MIGRATIONS.iter().enumerate().skip(current) {
        let version = index + 1;
        info!("Applying migration {}: {}", version, name);

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        if version == 1 {
            seed_templates(&tx)?;
        }
        tx.pragma_update(None, "user_version", version as u32)?;
        tx.commit()?;
        applied += 1;
    }

    Ok(applied)
}

fn seed_templates(conn: &Connection) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    for (name, content, description) in DEFAULT_TEMPLATES {
        conn.execute(
            "INSERT OR IGNORE INTO message_templates (name, content, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![name, content, description, now],
        )?;
    }
    Ok(())
}
