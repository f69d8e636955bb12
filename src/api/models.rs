use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub text: String,
    /// ISO-8601, assigned by the client when the message is composed.
    pub timestamp: String,
}

impl Message {
    /// Compose a message stamped with `at`. The id is the millisecond timestamp.
    pub fn compose(sender: &str, text: &str, at: DateTime<Utc>) -> Self {
        Self {
            id: at.timestamp_millis().to_string(),
            sender: sender.to_string(),
            text: text.to_string(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn includes(&self, username: &str) -> bool {
        self.participants.iter().any(|p| p == username)
    }

    /// True for a two-person conversation between exactly `a` and `b`, in any order.
    pub fn is_pair_of(&self, a: &str, b: &str) -> bool {
        self.participants.len() == 2 && self.includes(a) && self.includes(b)
    }

    pub fn others<'a>(&'a self, username: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.participants
            .iter()
            .map(String::as_str)
            .filter(move |p| *p != username)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// A conversation not yet stored remotely. The id is optional; the client fills it in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConversationDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub participants: Vec<String>,
    pub messages: Vec<Message>,
}

impl ConversationDraft {
    pub fn into_conversation(self, fallback_id: impl FnOnce() -> String) -> Conversation {
        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => fallback_id(),
        };
        Conversation {
            id,
            participants: self.participants,
            messages: self.messages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    #[serde(rename = "conectado")]
    Connected,
    #[serde(rename = "desconectado")]
    Disconnected,
    #[serde(rename = "escaneando_qr")]
    ScanningQr,
    #[serde(rename = "error")]
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Connected => "conectado",
            SessionStatus::Disconnected => "desconectado",
            SessionStatus::ScanningQr => "escaneando_qr",
            SessionStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "conectado" => Some(SessionStatus::Connected),
            "desconectado" => Some(SessionStatus::Disconnected),
            "escaneando_qr" => Some(SessionStatus::ScanningQr),
            "error" => Some(SessionStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppSession {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl WhatsAppSession {
    pub fn is_connected(&self) -> bool {
        self.status == SessionStatus::Connected
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
}

/// A single message addressed to a phone number through one of the sessions.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub session_id: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Conversation {
        let at = Utc.with_ymd_and_hms(2025, 5, 28, 9, 39, 50).unwrap();
        Conversation {
            id: "c1".into(),
            participants: vec!["ChatUser".into(), "Ana".into()],
            messages: vec![Message::compose("Ana", "hola", at)],
        }
    }

    #[test]
    fn conversation_survives_the_wire() {
        let convo = sample();
        let json = serde_json::to_string(&convo).unwrap();
        let back: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, convo);
    }

    #[test]
    fn wire_shape_has_only_the_model_fields() {
        let value = serde_json::to_value(sample()).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        let msg = &value["messages"][0];
        assert_eq!(msg["timestamp"], "2025-05-28T09:39:50.000Z");
        assert_eq!(msg["id"], "1748425190000");
    }

    #[test]
    fn pair_match_ignores_order_but_not_size() {
        let mut convo = sample();
        assert!(convo.is_pair_of("Ana", "ChatUser"));
        convo.participants.push("Luis".into());
        assert!(!convo.is_pair_of("Ana", "ChatUser"));
    }

    #[test]
    fn draft_keeps_a_supplied_id() {
        let draft = ConversationDraft {
            id: Some("mine".into()),
            participants: vec!["a".into()],
            messages: vec![],
        };
        assert_eq!(draft.into_conversation(|| "fallback".into()).id, "mine");
    }

    #[test]
    fn draft_without_id_is_serialized_without_the_field() {
        let draft = ConversationDraft {
            id: None,
            participants: vec!["a".into()],
            messages: vec![],
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert!(value.get("id").is_none());
    }

    #[test]
    fn session_status_uses_dashboard_names() {
        let session = WhatsAppSession {
            id: "session_1".into(),
            name: "como".into(),
            created_at: "2025-05-28T09:39:50.000Z".into(),
            status: SessionStatus::ScanningQr,
            phone_number: None,
        };
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["status"], "escaneando_qr");
        assert_eq!(value["createdAt"], "2025-05-28T09:39:50.000Z");
        assert_eq!(SessionStatus::parse("escaneando_qr"), Some(SessionStatus::ScanningQr));
    }

    #[test]
    fn outgoing_message_wire_names() {
        let msg = OutgoingMessage {
            session_id: "s".into(),
            to: "+1".into(),
            kind: MessageKind::Text,
            text: "hi".into(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["sessionId"], "s");
        assert_eq!(value["type"], "text");
    }
}
