//! REST client for the remote flashcard service.

use super::{BackendError, CardSource, LearnBackend, Result, ScoreSink};
use crate::models::{CollectionId, Flashcard, ScoreUpdate};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LearnSessionResponse {
    flash_cards: Vec<Flashcard>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateScoresRequest<'a> {
    score_updates: &'a [ScoreUpdate],
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn learn_session_url(&self, collection_id: CollectionId) -> String {
        format!("{}/FlashCard/LearnSession/{}", self.base_url, collection_id)
    }

    fn update_scores_url(&self) -> String {
        format!("{}/FlashCard/UpdateScores", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turns a non-success response into an `Api` error carrying the server's message.
    fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(BackendError::Api {
            status: status.as_u16(),
            message: error_message(status, &body),
        })
    }
}

/// Prefers the `message` field of a JSON error body, falls back to the status text.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string()
        })
}

impl CardSource for ApiClient {
    fn fetch_batch(&self, collection_id: CollectionId, count: usize) -> Result<Vec<Flashcard>> {
        let url = self.learn_session_url(collection_id);
        log::debug!("GET {} (count={})", url, count);

        let request = self.client.get(&url).query(&[("count", count)]);
        let response = Self::check(self.authorized(request).send()?)?;
        let body: LearnSessionResponse = response.json()?;
        Ok(body.flash_cards)
    }
}

impl ScoreSink for ApiClient {
    fn submit(&self, updates: &[ScoreUpdate]) -> Result<()> {
        let url = self.update_scores_url();
        log::debug!("POST {} ({} updates)", url, updates.len());

        let request = self.client.post(&url).json(&UpdateScoresRequest {
            score_updates: updates,
        });
        Self::check(self.authorized(request).send()?)?;
        Ok(())
    }
}

impl LearnBackend for ApiClient {
    fn describe(&self) -> String {
        format!("Remote: {}", self.base_url)
    }
}
