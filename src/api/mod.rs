pub mod client;
pub mod error;
pub mod models;
pub mod store;

pub use client::ApiClient;
pub use error::ApiError;
pub use models::{Conversation, ConversationDraft, Message, OutgoingMessage, WhatsAppSession};
pub use store::{ConversationStore, MessageGateway};
