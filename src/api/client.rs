use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client as HttpClient;
use url::Url;

use crate::api::error::ApiError;
use crate::api::models::{Conversation, ConversationDraft, OutgoingMessage};
use crate::api::store::{ConversationStore, MessageGateway};

pub struct ApiClient {
    pub http: HttpClient,
    base: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_http(base_url, HttpClient::new())
    }

    pub fn with_http(base_url: &str, http: HttpClient) -> Result<Self, ApiError> {
        let base = Url::parse(&crate::utils::normalize_url(base_url))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(base.to_string()));
        }
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Turn a non-2xx answer into `ApiError::Status`, keeping the body text for the user.
    async fn check(resp: reqwest::Response, what: &str) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        error!("{what} failed: HTTP {status}: {body}");
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ConversationStore for ApiClient {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let endpoint = self.endpoint(&["conversations"])?;
        debug!("GET {endpoint}");
        let resp = self.http.get(endpoint).send().await?;
        let resp = Self::check(resp, "listing conversations").await?;
        Ok(resp.json::<Vec<Conversation>>().await?)
    }

    async fn create_conversation(&self, draft: ConversationDraft) -> Result<Conversation, ApiError> {
        let endpoint = self.endpoint(&["conversations"])?;
        let payload = draft.into_conversation(crate::utils::millis_id);
        debug!("POST {endpoint} id={}", payload.id);
        let resp = self.http.post(endpoint).json(&payload).send().await?;
        let resp = Self::check(resp, "creating conversation").await?;
        Ok(resp.json::<Conversation>().await?)
    }

    async fn replace_conversation(
        &self,
        id: &str,
        conversation: &Conversation,
    ) -> Result<Conversation, ApiError> {
        let endpoint = self.endpoint(&["conversations", id])?;
        debug!("PUT {endpoint} ({} messages)", conversation.messages.len());
        let resp = self.http.put(endpoint).json(conversation).send().await?;
        let resp = Self::check(resp, "updating conversation").await?;
        Ok(resp.json::<Conversation>().await?)
    }
}

#[async_trait]
impl MessageGateway for ApiClient {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), ApiError> {
        let endpoint = self.endpoint(&["messages"])?;
        debug!("POST {endpoint} to={}", message.to);
        let resp = self.http.post(endpoint).json(message).send().await?;
        Self::check(resp, "sending message").await?;
        Ok(())
    }
}
