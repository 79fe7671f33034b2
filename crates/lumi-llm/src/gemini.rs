use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{ChatStream, LlmProvider, Message, zero_vector};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Characters accepted per request before truncation.
const DEFAULT_TEXT_CAP: usize = 1000;

/// Pause between consecutive embedding requests.
const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(200);

/// Vector width of the Gemini embedding models.
const DEFAULT_DIMENSIONS: usize = 768;

/// Embedding-only Gemini backend.
///
/// The API takes one text per request and rate-limits aggressively, so the
/// batch contract is fulfilled by a serialized walk with a fixed
/// inter-request delay. A failure on one text is absorbed as a zero vector
/// so the rest of the batch survives.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
    dimensions: usize,
    text_cap: usize,
    request_delay: Duration,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("dimensions", &self.dimensions)
            .field("text_cap", &self.text_cap)
            .field("request_delay", &self.request_delay)
            .finish()
    }
}

impl Clone for GeminiProvider {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            embedding_model: self.embedding_model.clone(),
            dimensions: self.dimensions,
            text_cap: self.text_cap,
            request_delay: self.request_delay,
        }
    }
}

impl GeminiProvider {
    #[must_use]
    pub fn new(api_key: String, embedding_model: String) -> Self {
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_owned(),
            embedding_model,
            dimensions: DEFAULT_DIMENSIONS,
            text_cap: DEFAULT_TEXT_CAP,
            request_delay: DEFAULT_REQUEST_DELAY,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_base_url(mut self, mut base_url: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        self.base_url = base_url;
        self
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    #[must_use]
    pub fn with_text_cap(mut self, text_cap: usize) -> Self {
        self.text_cap = text_cap;
        self
    }

    #[must_use]
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    async fn embed_single(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let body = EmbedContentRequest {
            content: Content {
                parts: vec![Part { text }],
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/models/{}:embedContent",
                self.base_url, self.embedding_model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!("Gemini embedding API error {status}: {text}");
            return Err(LlmError::Other(format!(
                "Gemini embedding request failed (status {status})"
            )));
        }

        let resp: EmbedContentResponse = serde_json::from_str(&text)?;
        Ok(resp.embedding.values)
    }

    /// Truncate to the configured cap, counting characters.
    fn cap_input<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        let chars = text.chars().count();
        if chars > self.text_cap {
            tracing::warn!(
                chars,
                cap = self.text_cap,
                "embedding input exceeds cap, truncating"
            );
            std::borrow::Cow::Owned(text.chars().take(self.text_cap).collect())
        } else {
            std::borrow::Cow::Borrowed(text)
        }
    }
}

impl LlmProvider for GeminiProvider {
    async fn chat(&self, _messages: &[Message]) -> Result<String, LlmError> {
        Err(LlmError::ChatUnsupported { provider: "gemini" })
    }

    async fn chat_stream(&self, _messages: &[Message]) -> Result<ChatStream, LlmError> {
        Err(LlmError::ChatUnsupported { provider: "gemini" })
    }

    fn supports_chat(&self) -> bool {
        false
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                vectors.push(zero_vector(self.dimensions));
                continue;
            }

            let capped = self.cap_input(text);

            match self.embed_single(&capped).await {
                Ok(v) => {
                    vectors.push(v);
                    if i + 1 < texts.len() {
                        tokio::time::sleep(self.request_delay).await;
                    }
                }
                Err(e) => {
                    tracing::error!(item = i + 1, total = texts.len(), "embedding failed: {e}");
                    vectors.push(zero_vector(self.dimensions));
                }
            }
        }

        Ok(vectors)
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "gemini"
    }
}

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    content: Content<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}
