//! Client side of a WhatsApp messaging dashboard: sessions, conversations with
//! optimistic sends, and direct or bulk messages, all against a JSON REST store.

pub mod api;
pub mod conversations;
pub mod dashboard;
pub mod outbox;
pub mod sessions;
pub mod settings;
pub mod storage;
pub mod utils;

pub use conversations::{ConversationError, ConversationViewModel, Notice, PendingSend, StartPlan};
pub use settings::Settings;
