//! Direct and bulk messages sent through a WhatsApp session.

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::time::Duration;
use thiserror::Error;

use crate::api::models::{MessageKind, OutgoingMessage, WhatsAppSession};
use crate::api::store::MessageGateway;
use crate::utils::is_phone_number;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OutboxError {
    #[error("a session must be selected")]
    NoSession,
    #[error("invalid phone number {0:?}: it must include the country code, e.g. +1234567890")]
    InvalidPhone(String),
    #[error("message must not be empty")]
    EmptyText,
    #[error("campaign name must not be empty")]
    EmptyCampaignName,
    #[error("messages per minute must be at least 1")]
    InvalidRate,
    #[error("no connected session: connect a WhatsApp session before creating campaigns")]
    NoConnectedSession,
    #[error("session {0} is not connected")]
    SessionNotConnected(String),
    #[error("the contact list has no valid contacts")]
    NoContacts,
}

fn clean_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect()
}

/// Validate a single message from the "send message" form.
pub fn compose(session_id: &str, to: &str, text: &str) -> Result<OutgoingMessage, OutboxError> {
    let session_id = session_id.trim();
    if session_id.is_empty() {
        return Err(OutboxError::NoSession);
    }
    let to = to.trim();
    if !is_phone_number(to) {
        return Err(OutboxError::InvalidPhone(to.to_string()));
    }
    if text.trim().is_empty() {
        return Err(OutboxError::EmptyText);
    }
    Ok(OutgoingMessage {
        session_id: session_id.to_string(),
        to: to.to_string(),
        kind: MessageKind::Text,
        text: text.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based line in the uploaded file.
    pub line: usize,
    pub content: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactList {
    pub contacts: Vec<Contact>,
    pub rejected: Vec<RejectedRow>,
}

/// Split one CSV record. Fields may be wrapped in double quotes, which lets them
/// hold commas; `""` inside a quoted field is a literal quote. Fields are trimmed.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' if quoted => quoted = false,
            '"' if field.trim().is_empty() => {
                field.clear();
                quoted = true;
            }
            ',' if !quoted => fields.push(std::mem::take(&mut field).trim().to_string()),
            c => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

fn is_header(name: &str, phone: &str) -> bool {
    let name = name.to_lowercase();
    let phone = phone.to_lowercase();
    matches!(name.as_str(), "name" | "nombre")
        || ["phone", "tel", "numero", "número"]
            .iter()
            .any(|h| phone.contains(h))
}

/// Parse `name,phone` rows. A header row is skipped, blank lines are ignored and
/// malformed rows are reported instead of aborting the import.
pub fn parse_contacts(csv: &str) -> ContactList {
    let mut list = ContactList::default();
    let mut seen_row = false;
    for (idx, raw) in csv.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let first_row = !seen_row;
        seen_row = true;

        let fields = split_record(line);
        let [name, phone_field, ..] = fields.as_slice() else {
            list.rejected.push(RejectedRow {
                line: idx + 1,
                content: line.to_string(),
                reason: "expected name and phone number separated by a comma".into(),
            });
            continue;
        };
        if first_row && is_header(name, phone_field) {
            continue;
        }
        let phone = clean_phone(phone_field);
        if !is_phone_number(&phone) {
            list.rejected.push(RejectedRow {
                line: idx + 1,
                content: line.to_string(),
                reason: OutboxError::InvalidPhone(phone_field.clone()).to_string(),
            });
            continue;
        }
        list.contacts.push(Contact {
            name: name.clone(),
            phone,
        });
    }
    list
}

/// Fill `{name}` and `{phone}` in a message template.
pub fn render_template(template: &str, contact: &Contact) -> String {
    template
        .replace("{name}", &contact.name)
        .replace("{phone}", &contact.phone)
}

#[derive(Debug, Clone)]
pub struct Campaign {
    pub name: String,
    pub session_id: String,
    pub template: String,
    pub contacts: Vec<Contact>,
    pub per_minute: u32,
    /// `None` sends immediately.
    pub start_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMessage {
    /// Delay after the campaign starts.
    pub offset: Duration,
    pub message: OutgoingMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: String,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignReport {
    pub campaign: String,
    pub deliveries: Vec<Delivery>,
    pub pending: usize,
}

impl CampaignReport {
    pub fn new(campaign: &str, planned: usize) -> Self {
        Self {
            campaign: campaign.to_string(),
            deliveries: Vec::with_capacity(planned),
            pending: planned,
        }
    }

    fn record(&mut self, to: &str, status: DeliveryStatus) {
        self.pending = self.pending.saturating_sub(1);
        self.deliveries.push(Delivery {
            to: to.to_string(),
            status,
        });
    }

    pub fn delivered(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|d| d.status == DeliveryStatus::Delivered)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.deliveries.len() - self.delivered()
    }

    pub fn total(&self) -> usize {
        self.deliveries.len() + self.pending
    }
}

impl Campaign {
    pub fn validate(&self, sessions: &[WhatsAppSession]) -> Result<(), OutboxError> {
        if self.name.trim().is_empty() {
            return Err(OutboxError::EmptyCampaignName);
        }
        if self.template.trim().is_empty() {
            return Err(OutboxError::EmptyText);
        }
        if self.per_minute == 0 {
            return Err(OutboxError::InvalidRate);
        }
        if self.contacts.is_empty() {
            return Err(OutboxError::NoContacts);
        }
        if !sessions.iter().any(WhatsAppSession::is_connected) {
            return Err(OutboxError::NoConnectedSession);
        }
        if self.session_id.trim().is_empty() {
            return Err(OutboxError::NoSession);
        }
        if !sessions
            .iter()
            .any(|s| s.id == self.session_id && s.is_connected())
        {
            return Err(OutboxError::SessionNotConnected(self.session_id.clone()));
        }
        Ok(())
    }

    /// One message per contact, spaced evenly at `per_minute`.
    pub fn plan(&self) -> Vec<PlannedMessage> {
        let step_ms = 60_000 / u64::from(self.per_minute.max(1));
        self.contacts
            .iter()
            .enumerate()
            .map(|(i, contact)| PlannedMessage {
                offset: Duration::from_millis(step_ms * i as u64),
                message: OutgoingMessage {
                    session_id: self.session_id.clone(),
                    to: contact.phone.clone(),
                    kind: MessageKind::Text,
                    text: render_template(&self.template, contact),
                },
            })
            .collect()
    }

    /// Validate, wait for the start time, then send every planned message on its offset.
    /// Failures are recorded per contact and never retried.
    pub async fn run<G: MessageGateway + ?Sized>(
        &self,
        gateway: &G,
        sessions: &[WhatsAppSession],
    ) -> Result<CampaignReport, OutboxError> {
        self.validate(sessions)?;
        if let Some(at) = self.start_at {
            if let Ok(wait) = (at - Utc::now()).to_std() {
                info!("campaign {} starts in {}s", self.name, wait.as_secs());
                tokio::time::sleep(wait).await;
            }
        }

        let plan = self.plan();
        let mut report = CampaignReport::new(&self.name, plan.len());
        let started = tokio::time::Instant::now();
        for planned in plan {
            tokio::time::sleep_until(started + planned.offset).await;
            let status = match gateway.send(&planned.message).await {
                Ok(()) => DeliveryStatus::Delivered,
                Err(e) => {
                    warn!("campaign {}: sending to {} failed: {e}", self.name, planned.message.to);
                    DeliveryStatus::Failed(e.to_string())
                }
            };
            report.record(&planned.message.to, status);
        }
        info!(
            "campaign {} finished: {} delivered, {} failed",
            self.name,
            report.delivered(),
            report.failed()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ApiError;
    use crate::api::models::SessionStatus;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn session(id: &str, status: SessionStatus) -> WhatsAppSession {
        WhatsAppSession {
            id: id.into(),
            name: id.into(),
            created_at: "2025-05-28T09:39:50.000Z".into(),
            status,
            phone_number: None,
        }
    }

    fn contact(name: &str, phone: &str) -> Contact {
        Contact {
            name: name.into(),
            phone: phone.into(),
        }
    }

    fn campaign(per_minute: u32) -> Campaign {
        Campaign {
            name: "promo".into(),
            session_id: "s1".into(),
            template: "Hola {name}".into(),
            contacts: vec![contact("Ana", "+1"), contact("Luis", "+2"), contact("Eva", "+3")],
            per_minute,
            start_at: None,
        }
    }

    struct RecordingGateway {
        started: Instant,
        fail_to: Option<String>,
        sent: Mutex<Vec<(Duration, OutgoingMessage)>>,
    }

    impl RecordingGateway {
        fn new(fail_to: Option<&str>) -> Self {
            Self {
                started: Instant::now(),
                fail_to: fail_to.map(str::to_string),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MessageGateway for RecordingGateway {
        async fn send(&self, message: &OutgoingMessage) -> Result<(), ApiError> {
            self.sent
                .lock()
                .unwrap()
                .push((self.started.elapsed(), message.clone()));
            if self.fail_to.as_deref() == Some(message.to.as_str()) {
                return Err(ApiError::Status {
                    status: 502,
                    body: "not delivered".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn compose_validates_the_form() {
        assert_eq!(compose("", "+1", "hi"), Err(OutboxError::NoSession));
        assert!(matches!(compose("s", "555", "hi"), Err(OutboxError::InvalidPhone(_))));
        assert_eq!(compose("s", "+1", "  "), Err(OutboxError::EmptyText));
        let msg = compose(" s ", " +1234567890 ", "hola").unwrap();
        assert_eq!(msg.session_id, "s");
        assert_eq!(msg.to, "+1234567890");
    }

    #[test]
    fn contacts_skip_header_and_report_bad_rows() {
        let csv = "nombre,telefono\n\nAna, +34 600-111-222\n\"Luis\",\"+5215550001\"\nsin numero\nEva,12345\n";
        let list = parse_contacts(csv);

        assert_eq!(
            list.contacts,
            vec![contact("Ana", "+34600111222"), contact("Luis", "+5215550001")]
        );
        let lines: Vec<_> = list.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, [5, 6]);
    }

    #[test]
    fn quoted_fields_may_hold_commas_and_quotes() {
        let csv = "\"Pérez, Ana\",+34600111222\n\"Luis \"\"el Flaco\"\"\", \"+52 155 5000 1\"\n";
        let list = parse_contacts(csv);

        assert!(list.rejected.is_empty(), "{:?}", list.rejected);
        assert_eq!(
            list.contacts,
            vec![
                contact("Pérez, Ana", "+34600111222"),
                contact("Luis \"el Flaco\"", "+5215550001"),
            ]
        );
    }

    #[test]
    fn split_record_handles_quotes_and_empty_fields() {
        assert_eq!(split_record("a, \"b,c\" ,"), ["a", "b,c", ""]);
        assert_eq!(split_record("\"say \"\"hi\"\"\""), ["say \"hi\""]);
    }

    #[test]
    fn contacts_without_header_keep_the_first_row() {
        let list = parse_contacts("Ana,+1\nLuis,+2");
        assert_eq!(list.contacts.len(), 2);
        assert!(list.rejected.is_empty());
    }

    #[test]
    fn template_placeholders_are_filled() {
        let text = render_template("Hola {name}, tu número es {phone}", &contact("Ana", "+1"));
        assert_eq!(text, "Hola Ana, tu número es +1");
    }

    #[test]
    fn plan_spaces_messages_by_rate() {
        let plan = campaign(2).plan();
        let offsets: Vec<_> = plan.iter().map(|p| p.offset.as_secs()).collect();
        assert_eq!(offsets, [0, 30, 60]);
        assert_eq!(plan[1].message.text, "Hola Luis");
        assert_eq!(plan[1].message.session_id, "s1");
    }

    #[test]
    fn campaigns_need_a_connected_session() {
        let c = campaign(10);
        assert_eq!(
            c.validate(&[session("s1", SessionStatus::Disconnected)]),
            Err(OutboxError::NoConnectedSession)
        );
        assert_eq!(
            c.validate(&[
                session("s1", SessionStatus::Disconnected),
                session("s2", SessionStatus::Connected)
            ]),
            Err(OutboxError::SessionNotConnected("s1".into()))
        );
        assert_eq!(c.validate(&[session("s1", SessionStatus::Connected)]), Ok(()));

        let mut zero = campaign(0);
        assert_eq!(
            zero.validate(&[session("s1", SessionStatus::Connected)]),
            Err(OutboxError::InvalidRate)
        );
        zero.per_minute = 1;
        zero.contacts.clear();
        assert_eq!(
            zero.validate(&[session("s1", SessionStatus::Connected)]),
            Err(OutboxError::NoContacts)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_paces_sends_and_records_failures() {
        let gateway = RecordingGateway::new(Some("+2"));
        let report = campaign(6)
            .run(&gateway, &[session("s1", SessionStatus::Connected)])
            .await
            .unwrap();

        let sent = gateway.sent.lock().unwrap();
        let offsets: Vec<_> = sent.iter().map(|(at, _)| at.as_secs()).collect();
        assert_eq!(offsets, [0, 10, 20]);

        assert_eq!(report.delivered(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.pending, 0);
        assert_eq!(report.total(), 3);
        assert!(matches!(report.deliveries[1].status, DeliveryStatus::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_campaign_sends_nothing() {
        let gateway = RecordingGateway::new(None);
        let err = campaign(6).run(&gateway, &[]).await.unwrap_err();
        assert_eq!(err, OutboxError::NoConnectedSession);
        assert!(gateway.sent.lock().unwrap().is_empty());
    }
}
