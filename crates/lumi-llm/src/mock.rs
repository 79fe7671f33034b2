//! Test-only mock provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::provider::{ChatStream, LlmProvider, Message, zero_vector};

#[derive(Debug, Clone)]
pub struct MockProvider {
    responses: Arc<Mutex<Vec<String>>>,
    pub default_response: String,
    embeddings: HashMap<String, Vec<f32>>,
    pub default_embedding: Vec<f32>,
    pub fail_chat: bool,
    pub fail_embed: bool,
    model: String,
    embed_calls: Arc<AtomicUsize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            default_response: "mock response".into(),
            embeddings: HashMap::new(),
            default_embedding: vec![0.1; 4],
            fail_chat: false,
            fail_embed: false,
            model: "mock-embedding".into(),
            embed_calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockProvider {
    #[must_use]
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_chat: true,
            fail_embed: true,
            ..Self::default()
        }
    }

    /// Register a handcrafted vector returned for an exact text.
    #[must_use]
    pub fn with_embedding(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.embeddings.insert(text.into(), vector);
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Number of `embed_batch` calls that reached this provider.
    #[must_use]
    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

impl LlmProvider for MockProvider {
    async fn chat(&self, _messages: &[Message]) -> Result<String, crate::LlmError> {
        if self.fail_chat {
            return Err(crate::LlmError::Other("mock LLM error".into()));
        }
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(self.default_response.clone())
        } else {
            Ok(responses.remove(0))
        }
    }

    async fn chat_stream(&self, messages: &[Message]) -> Result<ChatStream, crate::LlmError> {
        let response = self.chat(messages).await?;
        let chunks: Vec<_> = response.chars().map(|c| c.to_string()).map(Ok).collect();
        Ok(Box::pin(tokio_stream::iter(chunks)))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, crate::LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed {
            return Err(crate::LlmError::Other("mock embed error".into()));
        }
        Ok(texts
            .iter()
            .map(|t| {
                if t.trim().is_empty() {
                    zero_vector(self.default_embedding.len())
                } else {
                    self.embeddings
                        .get(t)
                        .cloned()
                        .unwrap_or_else(|| self.default_embedding.clone())
                }
            })
            .collect())
    }

    fn embedding_model(&self) -> &str {
        &self.model
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn chat_returns_scripted_responses_in_order() {
        let provider = MockProvider::with_responses(vec!["one".into(), "two".into()]);
        assert_eq!(provider.chat(&[]).await.unwrap(), "one");
        assert_eq!(provider.chat(&[]).await.unwrap(), "two");
        assert_eq!(provider.chat(&[]).await.unwrap(), "mock response");
    }

    #[tokio::test]
    async fn failing_chat_errors() {
        let provider = MockProvider::failing();
        assert!(provider.chat(&[]).await.is_err());
    }

    #[tokio::test]
    async fn embed_batch_uses_registered_vectors() {
        let provider = MockProvider::default().with_embedding("sun", vec![1.0, 0.0, 0.0, 0.0]);
        let texts: Vec<String> = vec!["sun".into(), "moon".into()];
        let vectors = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(vectors[1], provider.default_embedding);
    }

    #[tokio::test]
    async fn embed_batch_counts_calls() {
        let provider = MockProvider::default();
        let texts: Vec<String> = vec!["a".into()];
        provider.embed_batch(&texts).await.unwrap();
        provider.embed_batch(&texts).await.unwrap();
        assert_eq!(provider.embed_calls(), 2);
    }

    #[tokio::test]
    async fn blank_text_maps_to_zero_vector() {
        let provider = MockProvider::default();
        let texts: Vec<String> = vec!["  ".into()];
        let vectors = provider.embed_batch(&texts).await.unwrap();
        assert!(vectors[0].iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn chat_stream_yields_chars() {
        use tokio_stream::StreamExt;
        let provider = MockProvider::with_responses(vec!["hi".into()]);
        let mut stream = provider.chat_stream(&[]).await.unwrap();
        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            out.push_str(&chunk.unwrap());
        }
        assert_eq!(out, "hi");
    }
}
