//! HTTP implementation of the conversation API.
//!
//! Talks to the backend's REST routes, which keep trailing slashes:
//!
//! | Operation | Route |
//! |-----------|-------|
//! | create    | `POST {api}/conversations/` |
//! | get       | `GET {api}/conversations/{id}/` |
//! | end       | `POST {api}/conversations/{id}/end/` |
//! | list      | `GET {api}/conversations/?status=&search=` |
//! | query     | `POST {api}/conversations/query/` |

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::BackendConfig;
use crate::domain::conversation::{
    ConversationDetail, ConversationFilter, ConversationQuery, ConversationSummary,
    CreatedConversation, EndedConversation, QueryAnswer,
};
use crate::domain::foundation::ConversationId;
use crate::ports::{ApiError, ConversationApi};

/// reqwest-backed [`ConversationApi`].
#[derive(Debug, Clone)]
pub struct HttpConversationApi {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpConversationApi {
    /// Builds a client for the configured backend.
    pub fn new(config: &BackendConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base().to_string(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn collection_url(&self) -> String {
        format!("{}/conversations/", self.base_url)
    }

    fn conversation_url(&self, id: ConversationId) -> String {
        format!("{}/conversations/{}/", self.base_url, id)
    }

    fn end_url(&self, id: ConversationId) -> String {
        format!("{}/conversations/{}/end/", self.base_url, id)
    }

    fn query_url(&self) -> String {
        format!("{}/conversations/query/", self.base_url)
    }

    /// Sends a request and decodes a successful JSON body.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let response = Self::check_status(response).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::decode(e.to_string()))
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else if e.is_connect() {
            ApiError::network(format!("Connection failed: {}", e))
        } else {
            ApiError::network(e.to_string())
        }
    }

    async fn check_status(response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body: error_message(&body),
        })
    }
}

/// Pulls `{"error": "..."}` out of a backend error body when present.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl ConversationApi for HttpConversationApi {
    async fn create_conversation(&self) -> Result<ConversationId, ApiError> {
        let created: CreatedConversation = self
            .execute(
                self.client
                    .post(self.collection_url())
                    .json(&serde_json::json!({})),
            )
            .await?;

        tracing::debug!(conversation_id = %created.id, "Conversation created");
        Ok(created.id)
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<ConversationDetail, ApiError> {
        self.execute(self.client.get(self.conversation_url(id))).await
    }

    async fn end_conversation(&self, id: ConversationId) -> Result<EndedConversation, ApiError> {
        let ended: EndedConversation = self
            .execute(self.client.post(self.end_url(id)).json(&serde_json::json!({})))
            .await?;

        tracing::debug!(
            conversation_id = %id,
            has_summary = ended.summary.is_some(),
            "Conversation ended"
        );
        Ok(ended)
    }

    async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<ConversationSummary>, ApiError> {
        self.execute(
            self.client
                .get(self.collection_url())
                .query(&filter.query_pairs()),
        )
        .await
    }

    async fn query_conversations(&self, query: &ConversationQuery) -> Result<QueryAnswer, ApiError> {
        self.execute(self.client.post(self.query_url()).json(query))
            .await
    }
}
