use rusqlite::{OptionalExtension, Row, params};

use super::{Store, now_rfc3339, parse_ts};
use crate::Result;
use crate::models::MessageTemplate;

fn template_from_row(row: &Row<'_>) -> rusqlite::Result<MessageTemplate> {
    Ok(MessageTemplate {
        name: row.get(0)?,
        content: row.get(1)?,
        description: row.get(2)?,
        created_at: parse_ts(3, row.get(3)?)?,
        updated_at: parse_ts(4, row.get(4)?)?,
    })
}

impl Store {
    pub fn template(&self, name: &str) -> Result<Option<MessageTemplate>> {
        let conn = self.conn()?;
        Ok(conn
            .query_row(
                "SELECT name, content, description, created_at, updated_at
                 FROM message_templates WHERE name = ?1",
                params![name],
                template_from_row,
            )
            .optional()?)
    }

    pub fn templates(&self) -> Result<Vec<MessageTemplate>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT name, content, description, created_at, updated_at
             FROM message_templates ORDER BY name",
        )?;
        let templates = stmt
            .query_map([], template_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(templates)
    }

    /// Insert or replace the content of a template, keeping its creation time
    pub fn upsert_template(
        &self,
        name: &str,
        content: &str,
        description: Option<&str>,
    ) -> Result<MessageTemplate> {
        {
            let conn = self.conn()?;
            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO message_templates (name, content, description, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(name) DO UPDATE SET
                    content = excluded.content,
                    description = COALESCE(excluded.description, message_templates.description),
                    updated_at = excluded.updated_at",
                params![name, content, description, now],
            )?;
        }
        self.template(name)?
            .ok_or_else(|| crate::Error::NotFound(format!("template {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_templates_seeded() {
        let store = Store::in_memory().unwrap();
        let names: Vec<String> = store.templates().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["delivery_update", "order_confirmation"]);
    }

    #[test]
    fn test_upsert_template_keeps_description() {
        let store = Store::in_memory().unwrap();
        let before = store.template("order_confirmation").unwrap().unwrap();

        let updated = store
            .upsert_template("order_confirmation", "Pedido {order_number} listo", None)
            .unwrap();
        assert_eq!(updated.content, "Pedido {order_number} listo");
        assert_eq!(updated.description, before.description);
        assert_eq!(updated.created_at, before.created_at);

        let created = store
            .upsert_template("promo", "Promo {code}", Some("Weekly promo"))
            .unwrap();
        assert_eq!(created.description.as_deref(), Some("Weekly promo"));
        assert!(store.template("missing").unwrap().is_none());
    }
}
