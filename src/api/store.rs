use async_trait::async_trait;

use crate::api::error::ApiError;
use crate::api::models::{Conversation, ConversationDraft, OutgoingMessage};

/// Remote home of the conversations. One best-effort round trip per call.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError>;

    async fn create_conversation(&self, draft: ConversationDraft) -> Result<Conversation, ApiError>;

    /// Full replace of the stored conversation at `id`.
    async fn replace_conversation(
        &self,
        id: &str,
        conversation: &Conversation,
    ) -> Result<Conversation, ApiError>;
}

/// Delivery of single messages through a WhatsApp session.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), ApiError>;
}
