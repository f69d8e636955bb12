use crate::api::models::{Conversation, WhatsAppSession};
use crate::outbox::CampaignReport;

/// Counters shown on the dashboard landing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub active_sessions: usize,
    pub active_conversations: usize,
    pub total_messages: usize,
    pub delivered: usize,
    pub failed: usize,
    pub pending: usize,
}

impl DashboardStats {
    pub fn collect(
        sessions: &[WhatsAppSession],
        conversations: &[Conversation],
        reports: &[CampaignReport],
    ) -> Self {
        let mut stats = Self {
            active_sessions: sessions.iter().filter(|s| s.is_connected()).count(),
            active_conversations: conversations.len(),
            ..Self::default()
        };
        for report in reports {
            stats.total_messages += report.total();
            stats.delivered += report.delivered();
            stats.failed += report.failed();
            stats.pending += report.pending;
        }
        stats
    }
}
