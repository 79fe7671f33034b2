use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Incremental chat response: a stream of text deltas.
pub type ChatStream = Pin<Box<dyn futures_core::Stream<Item = Result<String, LlmError>> + Send>>;

pub trait LlmProvider: Send + Sync {
    /// Send messages to the chat model and return the assistant response.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate, the response
    /// is invalid, or the backend does not support chat.
    fn chat(&self, messages: &[Message]) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Stream the assistant response as text deltas.
    ///
    /// # Errors
    ///
    /// Returns an error if the streaming request cannot be established.
    fn chat_stream(
        &self,
        messages: &[Message],
    ) -> impl Future<Output = Result<ChatStream, LlmError>> + Send;

    fn supports_streaming(&self) -> bool {
        false
    }

    fn supports_chat(&self) -> bool {
        true
    }

    /// Embed a batch of texts, preserving input order and length.
    ///
    /// Every input yields exactly one vector at the same position. Texts
    /// that are empty after trimming never reach the network and map to a
    /// zero vector of the backend's configured dimensionality.
    ///
    /// # Errors
    ///
    /// Returns an error when the whole call fails (e.g. network outage).
    /// Backends with per-item recovery substitute zero vectors for
    /// individual failures instead of erroring.
    fn embed_batch(
        &self,
        texts: &[String],
    ) -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// Identifier of the embedding model this provider was built with.
    fn embedding_model(&self) -> &str;

    fn name(&self) -> &str;
}

/// Zero vector used in place of embeddings for empty or failed inputs.
pub(crate) fn zero_vector(dimensions: usize) -> Vec<f32> {
    vec![0.0; dimensions]
}
