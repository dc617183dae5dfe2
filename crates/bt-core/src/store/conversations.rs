//! Customers, conversations, messages and the human support queue

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use super::{Store, now_rfc3339, parse_col, parse_ts};
use crate::models::{
    Conversation, ConversationState, Customer, Direction, HandlerType, Message, NewMessage,
    SupportTicket,
};
use crate::{Error, Result};

/// Result of recording an inbound WhatsApp message
#[derive(Debug, Clone)]
pub struct InboundRecord {
    pub customer: Customer,
    pub conversation: Conversation,
    pub message: Message,
    /// The conversation was created by this message
    pub first_interaction: bool,
}

const CUSTOMER_COLUMNS: &str = "id, name, phone_number, email, created_at, updated_at";
const CONVERSATION_COLUMNS: &str = "id, customer_id, current_state, handler_type, human_agent, \
     context_data, active, created_at, updated_at, last_interaction";
const MESSAGE_COLUMNS: &str = "id, conversation_id, content, media_url, direction, timestamp, \
     delivered, read, whatsapp_message_id";

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        phone_number: row.get(2)?,
        email: row.get(3)?,
        created_at: parse_ts(4, row.get(4)?)?,
        updated_at: parse_ts(5, row.get(5)?)?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let state: String = row.get(2)?;
    let handler: String = row.get(3)?;
    let context: String = row.get(5)?;
    Ok(Conversation {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        current_state: parse_col(2, ConversationState::parse(&state))?,
        handler_type: parse_col(3, HandlerType::parse(&handler))?,
        human_agent: row.get(4)?,
        context_data: parse_col(5, serde_json::from_str(&context))?,
        active: row.get(6)?,
        created_at: parse_ts(7, row.get(7)?)?,
        updated_at: parse_ts(8, row.get(8)?)?,
        last_interaction: parse_ts(9, row.get(9)?)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let direction: String = row.get(4)?;
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        content: row.get(2)?,
        media_url: row.get(3)?,
        direction: parse_col(4, Direction::parse(&direction))?,
        timestamp: parse_ts(5, row.get(5)?)?,
        delivered: row.get(6)?,
        read: row.get(7)?,
        whatsapp_message_id: row.get(8)?,
    })
}

fn ticket_from_row(row: &Row<'_>) -> rusqlite::Result<SupportTicket> {
    Ok(SupportTicket {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        phone_number: row.get(2)?,
        created_at: parse_ts(3, row.get(3)?)?,
    })
}

fn find_customer(conn: &Connection, phone_number: &str) -> Result<Option<Customer>> {
    let sql = format!("SELECT {} FROM customers WHERE phone_number = ?1", CUSTOMER_COLUMNS);
    Ok(conn
        .query_row(&sql, params![phone_number], customer_from_row)
        .optional()?)
}

fn customer_or_create(conn: &Connection, phone_number: &str) -> Result<(Customer, bool)> {
    if let Some(customer) = find_customer(conn, phone_number)? {
        return Ok((customer, false));
    }

    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO customers (name, phone_number, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![Customer::default_name(phone_number), phone_number, now],
    )?;
    info!("New customer registered: {}", phone_number);

    let customer = find_customer(conn, phone_number)?
        .ok_or_else(|| Error::NotFound(format!("customer {}", phone_number)))?;
    Ok((customer, true))
}

fn active_conversation_for(conn: &Connection, customer_id: i64) -> Result<Option<Conversation>> {
    let sql = format!(
        "SELECT {} FROM conversations WHERE customer_id = ?1 AND active = 1
         ORDER BY id DESC LIMIT 1",
        CONVERSATION_COLUMNS
    );
    Ok(conn
        .query_row(&sql, params![customer_id], conversation_from_row)
        .optional()?)
}

fn conversation_by_id(conn: &Connection, id: i64) -> Result<Conversation> {
    let sql = format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS);
    conn.query_row(&sql, params![id], conversation_from_row)
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("conversation {}", id)))
}

fn insert_conversation(conn: &Connection, customer_id: i64) -> Result<Conversation> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO conversations
            (customer_id, current_state, handler_type, context_data, active,
             created_at, updated_at, last_interaction)
         VALUES (?1, ?2, ?3, '{}', 1, ?4, ?4, ?4)",
        params![
            customer_id,
            ConversationState::Greeting.as_str(),
            HandlerType::Bot.as_str(),
            now
        ],
    )?;
    conversation_by_id(conn, conn.last_insert_rowid())
}

fn insert_message(conn: &Connection, conversation_id: i64, message: &NewMessage<'_>) -> Result<Message> {
    conn.execute(
        "INSERT INTO messages
            (conversation_id, content, media_url, direction, timestamp, whatsapp_message_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            conversation_id,
            message.content,
            message.media_url,
            message.direction.as_str(),
            now_rfc3339(),
            message.whatsapp_message_id,
        ],
    )?;
    let id = conn.last_insert_rowid();
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
    Ok(conn.query_row(&sql, params![id], message_from_row)?)
}

impl Store {
    /// Find the customer for a phone number, creating it on first contact
    pub fn get_or_create_customer(&self, phone_number: &str) -> Result<(Customer, bool)> {
        let conn = self.conn()?;
        customer_or_create(&conn, phone_number)
    }

    pub fn customer(&self, id: i64) -> Result<Customer> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLUMNS);
        conn.query_row(&sql, params![id], customer_from_row)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("customer {}", id)))
    }

    /// Active conversation for a customer, creating one in the greeting state.
    /// The flag is `true` when the conversation was just created.
    pub fn get_or_create_conversation(&self, customer_id: i64) -> Result<(Conversation, bool)> {
        let conn = self.conn()?;
        match active_conversation_for(&conn, customer_id)? {
            Some(conversation) => Ok((conversation, false)),
            None => Ok((insert_conversation(&conn, customer_id)?, true)),
        }
    }

    /// Active conversation for a phone number, if the customer has one
    pub fn conversation_for_phone(&self, phone_number: &str) -> Result<Option<Conversation>> {
        let conn = self.conn()?;
        match find_customer(&conn, phone_number)? {
            Some(customer) => active_conversation_for(&conn, customer.id),
            None => Ok(None),
        }
    }

    pub fn conversation(&self, id: i64) -> Result<Conversation> {
        let conn = self.conn()?;
        conversation_by_id(&conn, id)
    }

    /// Persist state, handler, agent, context and activity of a conversation
    pub fn save_conversation(&self, conversation: &Conversation) -> Result<()> {
        let conn = self.conn()?;
        let context = serde_json::to_string(&conversation.context_data)?;
        let updated = conn.execute(
            "UPDATE conversations
             SET current_state = ?1, handler_type = ?2, human_agent = ?3, context_data = ?4,
                 active = ?5, updated_at = ?6, last_interaction = ?7
             WHERE id = ?8",
            params![
                conversation.current_state.as_str(),
                conversation.handler_type.as_str(),
                conversation.human_agent,
                context,
                conversation.active,
                now_rfc3339(),
                conversation.last_interaction.to_rfc3339(),
                conversation.id,
            ],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("conversation {}", conversation.id)));
        }
        Ok(())
    }

    /// Store the bot's view of a conversation: state and context only.
    /// Handler and agent columns are left alone so a concurrent hand-off survives.
    pub fn update_state_and_context(
        &self,
        conversation_id: i64,
        state: ConversationState,
        context: &serde_json::Value,
    ) -> Result<()> {
        let conn = self.conn()?;
        let now = now_rfc3339();
        let updated = conn.execute(
            "UPDATE conversations
             SET current_state = ?1, context_data = ?2, updated_at = ?3, last_interaction = ?3
             WHERE id = ?4",
            params![state.as_str(), serde_json::to_string(context)?, now, conversation_id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("conversation {}", conversation_id)));
        }
        debug!("Conversation {} moved to {}", conversation_id, state.as_str());
        Ok(())
    }

    /// Record an inbound WhatsApp message: customer, conversation and message in one transaction
    pub fn record_inbound(
        &self,
        phone_number: &str,
        content: &str,
        media_url: Option<&str>,
        whatsapp_message_id: Option<&str>,
    ) -> Result<InboundRecord> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let (customer, _) = customer_or_create(&tx, phone_number)?;
        let (mut conversation, first_interaction) = match active_conversation_for(&tx, customer.id)? {
            Some(conversation) => (conversation, false),
            None => (insert_conversation(&tx, customer.id)?, true),
        };

        let message = insert_message(
            &tx,
            conversation.id,
            &NewMessage {
                content,
                media_url,
                direction: Direction::Inbound,
                whatsapp_message_id,
            },
        )?;

        let now = Utc::now();
        tx.execute(
            "UPDATE conversations SET last_interaction = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), conversation.id],
        )?;
        conversation.last_interaction = now;
        tx.commit()?;

        Ok(InboundRecord {
            customer,
            conversation,
            message,
            first_interaction,
        })
    }

    pub fn record_message(&self, conversation_id: i64, message: NewMessage<'_>) -> Result<Message> {
        let conn = self.conn()?;
        insert_message(&conn, conversation_id, &message)
    }

    /// Messages of a conversation, oldest first
    pub fn messages(&self, conversation_id: i64) -> Result<Vec<Message>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM messages WHERE conversation_id = ?1 ORDER BY timestamp ASC, id ASC",
            MESSAGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let messages = stmt
            .query_map(params![conversation_id], message_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// Put a conversation in the human support queue
    pub fn enqueue_support(&self, conversation_id: i64, phone_number: &str) -> Result<SupportTicket> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO support_queue (conversation_id, phone_number, created_at) VALUES (?1, ?2, ?3)",
            params![conversation_id, phone_number, now_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        info!(
            "Conversation {} queued for human support (ticket {})",
            conversation_id, id
        );
        Ok(conn.query_row(
            "SELECT id, conversation_id, phone_number, created_at FROM support_queue WHERE id = ?1",
            params![id],
            ticket_from_row,
        )?)
    }

    /// Pending support tickets, oldest first
    pub fn support_queue(&self) -> Result<Vec<SupportTicket>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, phone_number, created_at FROM support_queue ORDER BY id",
        )?;
        let tickets = stmt
            .query_map([], ticket_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tickets)
    }

    /// Remove the tickets of a conversation once a human picked it up
    pub fn dequeue_support(&self, conversation_id: i64) -> Result<usize> {
        let conn = self.conn()?;
        Ok(conn.execute(
            "DELETE FROM support_queue WHERE conversation_id = ?1",
            params![conversation_id],
        )?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_customer_created_once() {
        let store = Store::in_memory().unwrap();
        let (first, created) = store.get_or_create_customer("+5491112345678").unwrap();
        assert!(created);
        assert_eq!(first.name, "Customer 5678");

        let (again, created) = store.get_or_create_customer("+5491112345678").unwrap();
        assert!(!created);
        assert_eq!(again.id, first.id);
        assert_eq!(store.customer(first.id).unwrap().phone_number, "+5491112345678");
    }

    #[test]
    fn test_record_inbound_starts_conversation_once() {
        let store = Store::in_memory().unwrap();
        let first = store
            .record_inbound("+111", "hola", None, Some("SM1"))
            .unwrap();
        assert!(first.first_interaction);
        assert_eq!(first.conversation.current_state, ConversationState::Greeting);
        assert_eq!(first.message.direction, Direction::Inbound);
        assert_eq!(first.message.whatsapp_message_id.as_deref(), Some("SM1"));

        let second = store.record_inbound("+111", "1", None, None).unwrap();
        assert!(!second.first_interaction);
        assert_eq!(second.conversation.id, first.conversation.id);

        let messages = store.messages(first.conversation.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hola");
        assert_eq!(messages[1].content, "1");
    }

    #[test]
    fn test_save_conversation_persists_context_and_handler() {
        let store = Store::in_memory().unwrap();
        let record = store.record_inbound("+222", "hola", None, None).unwrap();
        let mut conversation = record.conversation;

        conversation.current_state = ConversationState::CustomerSupport;
        conversation.context_data = json!({"intent": "atencion_cliente", "confidence": 0.3});
        conversation.assign_human_agent("lucia");
        store.save_conversation(&conversation).unwrap();

        let loaded = store.conversation(conversation.id).unwrap();
        assert_eq!(loaded.current_state, ConversationState::CustomerSupport);
        assert_eq!(loaded.handler_type, HandlerType::HumanActive);
        assert_eq!(loaded.human_agent.as_deref(), Some("lucia"));
        assert_eq!(loaded.context_data["intent"], "atencion_cliente");

        let by_phone = store.conversation_for_phone("+222").unwrap().unwrap();
        assert_eq!(by_phone.id, conversation.id);
        assert!(store.conversation_for_phone("+999").unwrap().is_none());
    }

    #[test]
    fn test_update_state_unknown_conversation() {
        let store = Store::in_memory().unwrap();
        let err = store
            .update_state_and_context(404, ConversationState::MainMenu, &json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_update_state_keeps_handler_and_agent() {
        let store = Store::in_memory().unwrap();
        let record = store.record_inbound("+555", "hola", None, None).unwrap();

        let mut assigned = store.conversation(record.conversation.id).unwrap();
        assigned.assign_human_agent("lucia");
        store.save_conversation(&assigned).unwrap();

        store
            .update_state_and_context(
                record.conversation.id,
                ConversationState::MainMenu,
                &json!({"intent": "menu_principal"}),
            )
            .unwrap();

        let loaded = store.conversation(record.conversation.id).unwrap();
        assert_eq!(loaded.current_state, ConversationState::MainMenu);
        assert_eq!(loaded.context_data["intent"], "menu_principal");
        assert_eq!(loaded.handler_type, HandlerType::HumanActive);
        assert_eq!(loaded.human_agent.as_deref(), Some("lucia"));
    }

    #[test]
    fn test_outbound_message_recorded() {
        let store = Store::in_memory().unwrap();
        let (customer, _) = store.get_or_create_customer("+333").unwrap();
        let (conversation, created) = store.get_or_create_conversation(customer.id).unwrap();
        assert!(created);
        let (_, created) = store.get_or_create_conversation(customer.id).unwrap();
        assert!(!created);

        let message = store
            .record_message(
                conversation.id,
                NewMessage {
                    content: "¡Hola!",
                    media_url: None,
                    direction: Direction::Outbound,
                    whatsapp_message_id: Some("SM9"),
                },
            )
            .unwrap();
        assert_eq!(message.direction, Direction::Outbound);
        assert!(!message.delivered);
    }

    #[test]
    fn test_support_queue() {
        let store = Store::in_memory().unwrap();
        let record = store.record_inbound("+444", "ayuda", None, None).unwrap();
        let ticket = store.enqueue_support(record.conversation.id, "+444").unwrap();
        assert_eq!(ticket.phone_number, "+444");
        assert_eq!(store.support_queue().unwrap().len(), 1);

        assert_eq!(store.dequeue_support(record.conversation.id).unwrap(), 1);
        assert!(store.support_queue().unwrap().is_empty());
    }
}
