//! Remote essay gateway
//!
//! One method per REST endpoint. `create` and `submit_for_analysis` are not
//! idempotent: calling them twice creates a second essay or re-triggers the
//! analysis, so callers guard against duplicate submissions.

use async_trait::async_trait;
use mentor_types::{
    Essay, EssayDraft, EssayId, EssayQuery, EssayStatus, Feedback, FeedbackId, Page, UserStats,
};
use serde::de::IgnoredAny;

use crate::api::ApiClient;
use crate::error::ApiError;

#[async_trait]
pub trait EssayGateway: Send + Sync {
    /// New essays always start as DRAFT.
    async fn create(&self, draft: &EssayDraft) -> Result<Essay, ApiError>;

    async fn get(&self, id: EssayId) -> Result<Essay, ApiError>;

    async fn update(&self, id: EssayId, draft: &EssayDraft) -> Result<Essay, ApiError>;

    async fn delete(&self, id: EssayId) -> Result<(), ApiError>;

    /// Server-side paginated listing. The result is one page, never the
    /// whole collection.
    async fn list(&self, query: &EssayQuery) -> Result<Page<Essay>, ApiError>;

    async fn list_by_status(&self, status: EssayStatus) -> Result<Vec<Essay>, ApiError>;

    async fn search(&self, keyword: &str, page: u32, size: u32) -> Result<Page<Essay>, ApiError>;

    /// DRAFT -> SUBMITTED. The returned essay is SUBMITTED, never ANALYZED.
    async fn submit_for_analysis(&self, id: EssayId) -> Result<Essay, ApiError>;

    /// Empty while the analysis is still running.
    async fn feedbacks_for_essay(&self, id: EssayId) -> Result<Vec<Feedback>, ApiError>;

    async fn feedback(&self, id: FeedbackId) -> Result<Feedback, ApiError>;

    async fn user_feedbacks(&self) -> Result<Vec<Feedback>, ApiError>;

    async fn user_stats(&self) -> Result<UserStats, ApiError>;
}

/// [`EssayGateway`] over the REST API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: ApiClient,
}

impl HttpGateway {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Gateway whose failures never reach the notification bridge.
    pub fn silent(&self) -> Self {
        Self {
            client: self.client.silent(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl EssayGateway for HttpGateway {
    async fn create(&self, draft: &EssayDraft) -> Result<Essay, ApiError> {
        self.client.post("/essays", draft).await
    }

    async fn get(&self, id: EssayId) -> Result<Essay, ApiError> {
        self.client.get(&format!("/essays/{id}")).await
    }

    async fn update(&self, id: EssayId, draft: &EssayDraft) -> Result<Essay, ApiError> {
        self.client.put(&format!("/essays/{id}"), draft).await
    }

    async fn delete(&self, id: EssayId) -> Result<(), ApiError> {
        self.client
            .delete::<IgnoredAny>(&format!("/essays/{id}"))
            .await
            .map(|_| ())
    }

    async fn list(&self, query: &EssayQuery) -> Result<Page<Essay>, ApiError> {
        self.client
            .get_query("/essays", &query.to_query_pairs())
            .await
    }

    async fn list_by_status(&self, status: EssayStatus) -> Result<Vec<Essay>, ApiError> {
        self.client
            .get(&format!("/essays/status/{}", status.as_str()))
            .await
    }

    async fn search(&self, keyword: &str, page: u32, size: u32) -> Result<Page<Essay>, ApiError> {
        let query = [
            ("keyword", keyword.trim().to_string()),
            ("page", page.to_string()),
            ("size", size.to_string()),
        ];
        self.client.get_query("/essays/search", &query).await
    }

    async fn submit_for_analysis(&self, id: EssayId) -> Result<Essay, ApiError> {
        self.client.post_empty(&format!("/essays/{id}/submit")).await
    }

    async fn feedbacks_for_essay(&self, id: EssayId) -> Result<Vec<Feedback>, ApiError> {
        let feedbacks: Option<Vec<Feedback>> = self
            .client
            .get(&format!("/feedbacks/essay/{id}"))
            .await?;
        Ok(feedbacks.unwrap_or_default())
    }

    async fn feedback(&self, id: FeedbackId) -> Result<Feedback, ApiError> {
        self.client.get(&format!("/feedbacks/{id}")).await
    }

    async fn user_feedbacks(&self) -> Result<Vec<Feedback>, ApiError> {
        self.client.get("/feedbacks/user").await
    }

    async fn user_stats(&self) -> Result<UserStats, ApiError> {
        self.client.get("/feedbacks/user/stats").await
    }
}
