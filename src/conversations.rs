//! In-memory projection of the local user's conversations.
//!
//! Every mutation that talks to the remote store comes in two phases so a UI
//! event loop can render between them: `begin_*` validates and applies the local
//! change, `settle_*`/`finish_*` consumes the remote result. The `async`
//! wrappers run both phases against a [`ConversationStore`].

use chrono::Utc;
use log::{info, warn};
use thiserror::Error;

use crate::api::error::ApiError;
use crate::api::models::{Conversation, ConversationDraft, Message};
use crate::api::store::ConversationStore;

/// Rejections raised before any network call. They leave the view model untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversationError {
    #[error("no conversation is selected")]
    NoSelection,
    #[error("message text is empty")]
    EmptyMessage,
    #[error("recipient name is empty")]
    EmptyRecipient,
    #[error("you cannot start a conversation with yourself")]
    SelfAddressed,
}

/// Something the shell should surface to the user, typically as a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
}

/// A message applied locally but not yet confirmed by the store.
///
/// Holds the conversation exactly as it was before the append; a failed
/// confirmation puts that snapshot back.
#[derive(Debug, Clone)]
pub struct PendingSend {
    snapshot: Conversation,
    updated: Conversation,
}

impl PendingSend {
    pub fn conversation_id(&self) -> &str {
        &self.updated.id
    }

    /// The full conversation to hand to `replace_conversation`.
    pub fn payload(&self) -> &Conversation {
        &self.updated
    }

    pub fn message(&self) -> Option<&Message> {
        self.updated.messages.last()
    }
}

/// Outcome of validating a "new conversation" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPlan {
    /// A two-person conversation with the recipient already existed and is now selected.
    Existing(String),
    /// Nothing matched; the draft must be created remotely.
    Create(ConversationDraft),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub preview: Option<String>,
    pub selected: bool,
}

pub struct ConversationViewModel {
    username: String,
    conversations: Vec<Conversation>,
    selected: Option<String>,
    loading: bool,
    last_error: Option<String>,
    notices: Vec<Notice>,
}

impl ConversationViewModel {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            conversations: Vec::new(),
            selected: None,
            loading: false,
            last_error: None,
            notices: Vec::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&Conversation> {
        let id = self.selected.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Messages of the selected conversation; empty when nothing (or a dangling id) is selected.
    pub fn visible_messages(&self) -> &[Message] {
        self.selected().map(|c| c.messages.as_slice()).unwrap_or(&[])
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn has_failed(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn is_own(&self, message: &Message) -> bool {
        message.sender == self.username
    }

    pub fn title_of(&self, conversation: &Conversation) -> String {
        let others: Vec<&str> = conversation.others(&self.username).collect();
        if others.is_empty() {
            "Conversation".to_string()
        } else {
            others.join(", ")
        }
    }

    pub fn selected_title(&self) -> Option<String> {
        self.selected().map(|c| self.title_of(c))
    }

    pub fn summaries(&self) -> Vec<ConversationSummary> {
        self.conversations
            .iter()
            .map(|c| ConversationSummary {
                id: c.id.clone(),
                title: self.title_of(c),
                preview: c.last_message().map(|m| {
                    if self.is_own(m) {
                        format!("You: {}", m.text)
                    } else {
                        m.text.clone()
                    }
                }),
                selected: self.selected.as_deref() == Some(c.id.as_str()),
            })
            .collect()
    }

    pub fn select_conversation(&mut self, id: impl Into<String>) {
        self.selected = Some(id.into());
    }

    // ---- load ----

    pub fn begin_load(&mut self) {
        self.loading = true;
        self.last_error = None;
    }

    pub fn finish_load(&mut self, result: Result<Vec<Conversation>, ApiError>) {
        self.loading = false;
        match result {
            Ok(all) => {
                let total = all.len();
                self.conversations = all
                    .into_iter()
                    .filter(|c| c.includes(&self.username))
                    .collect();
                info!(
                    "loaded {} of {} conversations for {}",
                    self.conversations.len(),
                    total,
                    self.username
                );
            }
            Err(e) => self.fail("loading conversations", &e),
        }
    }

    pub async fn load<S: ConversationStore + ?Sized>(&mut self, store: &S) {
        self.begin_load();
        let result = store.list_conversations().await;
        self.finish_load(result);
    }

    // ---- send ----

    /// Validate `text`, append it to the selected conversation and return the pending write.
    pub fn begin_send(&mut self, text: &str) -> Result<PendingSend, ConversationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConversationError::EmptyMessage);
        }
        let id = self.selected.as_deref().ok_or(ConversationError::NoSelection)?;
        let slot = self
            .conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(ConversationError::NoSelection)?;

        let snapshot = slot.clone();
        let mut updated = snapshot.clone();
        updated
            .messages
            .push(Message::compose(&self.username, text, Utc::now()));
        *slot = updated.clone();
        Ok(PendingSend { snapshot, updated })
    }

    /// Keep the optimistic message on success, put the snapshot back on failure.
    pub fn settle_send(&mut self, pending: PendingSend, result: Result<Conversation, ApiError>) {
        if let Err(e) = result {
            let PendingSend { snapshot, .. } = pending;
            if let Some(slot) = self.conversations.iter_mut().find(|c| c.id == snapshot.id) {
                *slot = snapshot;
            }
            self.fail("sending message", &e);
        }
    }

    pub async fn send_message<S: ConversationStore + ?Sized>(
        &mut self,
        store: &S,
        text: &str,
    ) -> Result<(), ConversationError> {
        let pending = self.begin_send(text)?;
        let result = store
            .replace_conversation(pending.conversation_id(), pending.payload())
            .await;
        self.settle_send(pending, result);
        Ok(())
    }

    // ---- start ----

    pub fn begin_start(
        &mut self,
        recipient: &str,
        initial_text: &str,
    ) -> Result<StartPlan, ConversationError> {
        let recipient = recipient.trim();
        let text = initial_text.trim();
        if recipient.is_empty() {
            return Err(ConversationError::EmptyRecipient);
        }
        if recipient == self.username {
            return Err(ConversationError::SelfAddressed);
        }
        if text.is_empty() {
            return Err(ConversationError::EmptyMessage);
        }

        if let Some(existing) = self
            .conversations
            .iter()
            .find(|c| c.is_pair_of(&self.username, recipient))
        {
            let id = existing.id.clone();
            self.selected = Some(id.clone());
            self.notices.push(Notice::Info(format!(
                "The conversation with {recipient} already exists. Switched to it."
            )));
            return Ok(StartPlan::Existing(id));
        }

        self.loading = true;
        Ok(StartPlan::Create(ConversationDraft {
            id: None,
            participants: vec![self.username.clone(), recipient.to_string()],
            messages: vec![Message::compose(&self.username, text, Utc::now())],
        }))
    }

    pub fn finish_start(&mut self, result: Result<Conversation, ApiError>) {
        self.loading = false;
        match result {
            Ok(created) => {
                let title = self.title_of(&created);
                info!("created conversation {} with {title}", created.id);
                self.selected = Some(created.id.clone());
                self.conversations.push(created);
                self.notices
                    .push(Notice::Info(format!("Conversation with {title} created.")));
            }
            Err(e) => self.fail("creating conversation", &e),
        }
    }

    pub async fn start_conversation<S: ConversationStore + ?Sized>(
        &mut self,
        store: &S,
        recipient: &str,
        initial_text: &str,
    ) -> Result<(), ConversationError> {
        if let StartPlan::Create(draft) = self.begin_start(recipient, initial_text)? {
            let result = store.create_conversation(draft).await;
            self.finish_start(result);
        }
        Ok(())
    }

    fn fail(&mut self, action: &str, err: &ApiError) {
        warn!("{action} failed: {err}");
        let message = if err.is_unreachable() {
            format!(
                "Could not reach the chat server while {action}. Check that the backend is running and reachable."
            )
        } else {
            format!("Error {action}: {err}")
        };
        self.notices.push(Notice::Error(message.clone()));
        self.last_error = Some(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const ME: &str = "ChatUser";

    fn msg(id: &str, sender: &str, text: &str) -> Message {
        Message {
            id: id.into(),
            sender: sender.into(),
            text: text.into(),
            timestamp: "2025-05-28T09:39:50.000Z".into(),
        }
    }

    fn convo(id: &str, participants: &[&str], messages: Vec<Message>) -> Conversation {
        Conversation {
            id: id.into(),
            participants: participants.iter().map(|p| p.to_string()).collect(),
            messages,
        }
    }

    #[derive(Default)]
    struct FakeStore {
        remote: Mutex<Vec<Conversation>>,
        fail_with: Option<u16>,
        replaced: Mutex<Vec<Conversation>>,
        created: Mutex<Vec<ConversationDraft>>,
    }

    impl FakeStore {
        fn with(remote: Vec<Conversation>) -> Self {
            Self {
                remote: Mutex::new(remote),
                ..Default::default()
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                fail_with: Some(status),
                ..Default::default()
            }
        }

        fn check(&self) -> Result<(), ApiError> {
            match self.fail_with {
                Some(status) => Err(ApiError::Status {
                    status,
                    body: "boom".into(),
                }),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ConversationStore for FakeStore {
        async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
            self.check()?;
            Ok(self.remote.lock().unwrap().clone())
        }

        async fn create_conversation(
            &self,
            draft: ConversationDraft,
        ) -> Result<Conversation, ApiError> {
            self.created.lock().unwrap().push(draft.clone());
            self.check()?;
            let created = draft.into_conversation(|| "srv-1".into());
            self.remote.lock().unwrap().push(created.clone());
            Ok(created)
        }

        async fn replace_conversation(
            &self,
            _id: &str,
            conversation: &Conversation,
        ) -> Result<Conversation, ApiError> {
            self.replaced.lock().unwrap().push(conversation.clone());
            self.check()?;
            Ok(conversation.clone())
        }
    }

    fn loaded(conversations: Vec<Conversation>) -> ConversationViewModel {
        let mut vm = ConversationViewModel::new(ME);
        vm.finish_load(Ok(conversations));
        vm
    }

    #[tokio::test]
    async fn load_keeps_only_conversations_with_the_local_user() {
        let store = FakeStore::with(vec![
            convo("1", &[ME, "Ana"], vec![]),
            convo("2", &["Ana", "Luis"], vec![]),
            convo("3", &["Luis", ME, "Ana"], vec![]),
        ]);
        let mut vm = ConversationViewModel::new(ME);
        vm.load(&store).await;

        let ids: Vec<_> = vm.conversations().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert!(!vm.is_loading());
        assert!(!vm.has_failed());
    }

    #[test]
    fn load_sets_and_clears_the_loading_flag() {
        let mut vm = ConversationViewModel::new(ME);
        vm.begin_load();
        assert!(vm.is_loading());
        vm.finish_load(Ok(vec![]));
        assert!(!vm.is_loading());
    }

    #[tokio::test]
    async fn failed_load_keeps_the_previous_list() {
        let mut vm = loaded(vec![convo("1", &[ME, "Ana"], vec![])]);
        vm.load(&FakeStore::failing(500)).await;

        assert_eq!(vm.conversations().len(), 1);
        assert!(!vm.is_loading());
        assert!(vm.last_error().unwrap().contains("500"));
        assert!(matches!(vm.take_notices().as_slice(), [Notice::Error(_)]));
    }

    #[test]
    fn unreachable_server_gets_a_connection_hint() {
        let mut vm = ConversationViewModel::new(ME);
        vm.begin_load();
        vm.finish_load(Err(ApiError::Network("connection refused".into())));
        assert!(vm.last_error().unwrap().starts_with("Could not reach the chat server"));
    }

    #[test]
    fn dangling_selection_shows_no_messages() {
        let mut vm = loaded(vec![convo("1", &[ME, "Ana"], vec![msg("m0", "Ana", "hola")])]);
        vm.select_conversation("missing");
        assert_eq!(vm.selected_id(), Some("missing"));
        assert!(vm.visible_messages().is_empty());
        assert_eq!(vm.selected_title(), None);
    }

    #[test]
    fn optimistic_send_is_visible_before_the_store_answers() {
        let mut vm = loaded(vec![convo("1", &[ME, "Ana"], vec![msg("m0", "Ana", "hola")])]);
        vm.select_conversation("1");

        let pending = vm.begin_send("  hi ").unwrap();
        let texts: Vec<_> = vm.visible_messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["hola", "hi"]);
        assert_eq!(pending.payload().messages.len(), 2);
        assert_eq!(pending.message().unwrap().sender, ME);

        let confirmed = pending.payload().clone();
        vm.settle_send(pending, Ok(confirmed));
        assert_eq!(vm.visible_messages().len(), 2);
        assert!(!vm.has_failed());
    }

    #[tokio::test]
    async fn send_puts_the_full_conversation() {
        let store = FakeStore::default();
        let mut vm = loaded(vec![convo("1", &[ME, "Ana"], vec![msg("m0", "Ana", "hola")])]);
        vm.select_conversation("1");
        vm.send_message(&store, "hi").await.unwrap();

        let replaced = store.replaced.lock().unwrap();
        assert_eq!(replaced.len(), 1);
        assert_eq!(replaced[0].messages.len(), 2);
        assert_eq!(replaced[0].messages[1].text, "hi");
        assert_eq!(vm.visible_messages().len(), 2);
    }

    #[tokio::test]
    async fn failed_send_restores_the_snapshot() {
        let m0 = msg("m0", "Ana", "hola");
        let mut vm = loaded(vec![convo("1", &[ME, "Ana"], vec![m0.clone()])]);
        vm.select_conversation("1");
        vm.send_message(&FakeStore::failing(503), "hi").await.unwrap();

        assert_eq!(vm.visible_messages(), &[m0]);
        assert!(vm.has_failed());
    }

    #[test]
    fn send_validation_has_no_side_effects() {
        let mut vm = loaded(vec![convo("1", &[ME, "Ana"], vec![])]);
        assert_eq!(vm.begin_send("hi").unwrap_err(), ConversationError::NoSelection);
        vm.select_conversation("1");
        assert_eq!(vm.begin_send("   ").unwrap_err(), ConversationError::EmptyMessage);
        vm.select_conversation("gone");
        assert_eq!(vm.begin_send("hi").unwrap_err(), ConversationError::NoSelection);
        assert!(vm.conversations()[0].messages.is_empty());
        assert!(vm.take_notices().is_empty());
    }

    #[tokio::test]
    async fn start_selects_an_existing_pair_instead_of_creating() {
        let store = FakeStore::default();
        let mut vm = loaded(vec![
            convo("group", &[ME, "B", "C"], vec![]),
            convo("pair", &["B", ME], vec![]),
        ]);
        vm.start_conversation(&store, "B", "hello").await.unwrap();

        assert_eq!(vm.selected_id(), Some("pair"));
        assert_eq!(vm.conversations().len(), 2);
        assert!(store.created.lock().unwrap().is_empty());
        assert!(matches!(vm.take_notices().as_slice(), [Notice::Info(_)]));
    }

    #[tokio::test]
    async fn start_creates_and_selects_a_new_conversation() {
        let store = FakeStore::default();
        let mut vm = loaded(vec![convo("group", &[ME, "B", "C"], vec![])]);
        vm.start_conversation(&store, " B ", " hello ").await.unwrap();

        let created = store.created.lock().unwrap();
        let draft = &created[0];
        assert_eq!(draft.participants, [ME, "B"]);
        assert_eq!(draft.messages[0].text, "hello");

        assert_eq!(vm.conversations().len(), 2);
        assert_eq!(vm.selected_id(), Some("srv-1"));
        assert_eq!(vm.visible_messages().len(), 1);
        assert!(!vm.is_loading());
    }

    #[test]
    fn start_marks_loading_until_finished() {
        let mut vm = ConversationViewModel::new(ME);
        let plan = vm.begin_start("B", "hello").unwrap();
        assert!(matches!(plan, StartPlan::Create(_)));
        assert!(vm.is_loading());
        vm.finish_start(Err(ApiError::Status {
            status: 400,
            body: "bad".into(),
        }));
        assert!(!vm.is_loading());
        assert!(vm.conversations().is_empty());
        assert!(vm.last_error().unwrap().contains("bad"));
    }

    #[tokio::test]
    async fn failed_start_leaves_the_list_alone() {
        let mut vm = loaded(vec![convo("1", &[ME, "Ana"], vec![])]);
        vm.select_conversation("1");
        vm.start_conversation(&FakeStore::failing(500), "B", "hello")
            .await
            .unwrap();

        assert_eq!(vm.conversations().len(), 1);
        assert_eq!(vm.selected_id(), Some("1"));
        assert!(vm.has_failed());
    }

    #[tokio::test]
    async fn starting_with_yourself_is_rejected_without_mutation() {
        let store = FakeStore::default();
        let mut vm = loaded(vec![convo("1", &[ME, "Ana"], vec![])]);
        let err = vm.start_conversation(&store, ME, "text").await.unwrap_err();

        assert_eq!(err, ConversationError::SelfAddressed);
        assert_eq!(vm.conversations().len(), 1);
        assert_eq!(vm.selected_id(), None);
        assert!(!vm.is_loading());
        assert!(!vm.has_failed());
        assert!(vm.take_notices().is_empty());
        assert!(store.created.lock().unwrap().is_empty());
    }

    #[test]
    fn summaries_name_the_other_side_and_mark_own_messages() {
        let mut vm = loaded(vec![
            convo("1", &[ME, "Ana"], vec![msg("m0", "Ana", "hola"), msg("m1", ME, "hey")]),
            convo("2", &[ME], vec![]),
            convo("3", &[ME, "Ana", "Luis"], vec![msg("m0", "Luis", "yo")]),
        ]);
        vm.select_conversation("3");
        let summaries = vm.summaries();

        assert_eq!(summaries[0].title, "Ana");
        assert_eq!(summaries[0].preview.as_deref(), Some("You: hey"));
        assert_eq!(summaries[1].title, "Conversation");
        assert_eq!(summaries[1].preview, None);
        assert_eq!(summaries[2].title, "Ana, Luis");
        assert_eq!(summaries[2].preview.as_deref(), Some("yo"));
        assert!(summaries[2].selected && !summaries[0].selected);
    }
}
