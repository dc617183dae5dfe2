//! Domain models persisted by the store

mod catalog;
mod conversation;
mod template;

pub use catalog::{Category, NewCategory, NewProduct, NewSpecialOffer, Product, SpecialOffer};
pub use conversation::{
    Conversation, ConversationState, Customer, Direction, HandlerType, Message, NewMessage,
    SupportTicket,
};
pub use template::{DEFAULT_TEMPLATES, MessageTemplate};
