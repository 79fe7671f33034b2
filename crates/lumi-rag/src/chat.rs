//! Grounded chat: retrieval context ahead of the conversation.

use crate::error::Result;
use crate::retriever::{self, ScoredChunk};
use crate::store::Index;
use lumi_llm::provider::{ChatStream, LlmProvider, Message};

/// Canonical refusal line the model is instructed to use, and the
/// downstream fallback when generation fails outright.
pub const NO_INFORMATION_ANSWER: &str = "I do not have that information in my knowledge base.";

fn system_prompt(context: &str) -> String {
    format!(
        "You are LUMI, a knowledgeable and friendly assistant. Answer ONLY \
         from the sources below. If the answer is not in them, reply: \
         \"{NO_INFORMATION_ANSWER}\" Keep answers concise (under 200 words) \
         and cite sources as [Source N] when relevant.\n\n{context}"
    )
}

/// Assemble the message sequence for the chat model: grounding system
/// message first, then prior turns, then the question.
#[must_use]
pub fn build_messages(
    query: &str,
    retrieved: &[ScoredChunk],
    history: &[Message],
) -> Vec<Message> {
    let context = retriever::format_context(retrieved);
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system_prompt(&context)));
    messages.extend_from_slice(history);
    messages.push(Message::user(format!("Question: {query}")));
    messages
}

/// Retrieve context for `query` and produce a complete grounded answer.
///
/// # Errors
///
/// Returns retrieval errors (model/dimension mismatch, provider failures)
/// and chat provider errors.
pub async fn answer<E: LlmProvider, C: LlmProvider>(
    query: &str,
    history: &[Message],
    index: &Index,
    embedder: &E,
    chat: &C,
    top_k: usize,
) -> Result<String> {
    let retrieved = retriever::retrieve(query, index, embedder, top_k).await?;
    let messages = build_messages(query, &retrieved, history);
    Ok(chat.chat(&messages).await?)
}

/// Streaming variant of [`answer`].
///
/// # Errors
///
/// Same failure modes as [`answer`], surfaced before the stream starts.
pub async fn answer_stream<E: LlmProvider, C: LlmProvider>(
    query: &str,
    history: &[Message],
    index: &Index,
    embedder: &E,
    chat: &C,
    top_k: usize,
) -> Result<ChatStream> {
    let retrieved = retriever::retrieve(query, index, embedder, top_k).await?;
    let messages = build_messages(query, &retrieved, history);
    Ok(chat.chat_stream(&messages).await?)
}
