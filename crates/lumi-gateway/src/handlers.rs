use std::convert::Infallible;
use std::pin::Pin;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;

use super::server::AppState;
use lumi_llm::provider::Message;
use lumi_rag::chat;

/// Stream sentinels, part of the wire format consumed by the frontend.
const END_SENTINEL: &str = "[END]";
const ERROR_SENTINEL: &str = "[ERROR]";

type EventStream = Pin<Box<dyn futures_core::Stream<Item = Result<Event, Infallible>> + Send>>;

enum Step {
    Delta(String),
    Fail,
    End,
}

#[derive(serde::Deserialize)]
pub(crate) struct ChatPayload {
    pub query: String,
    #[serde(default)]
    pub history: Vec<Message>,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    Json(payload): Json<ChatPayload>,
) -> impl IntoResponse {
    let stream = chat::answer_stream(
        &payload.query,
        &payload.history,
        &state.index,
        state.embedder.as_ref(),
        state.chat.as_ref(),
        state.top_k,
    )
    .await;

    let events: EventStream = match stream {
        Ok(deltas) => {
            let tagged = deltas
                .map(|item| match item {
                    Ok(chunk) => Step::Delta(chunk),
                    Err(e) => {
                        tracing::error!("chat stream failed mid-flight: {e}");
                        Step::Fail
                    }
                })
                .chain(tokio_stream::once(Step::End));

            // A failure event terminates the stream; [END] never follows it.
            let mut failed = false;
            Box::pin(tagged.map_while(move |step| {
                if failed {
                    return None;
                }
                Some(Ok(match step {
                    Step::Delta(chunk) => Event::default().data(chunk),
                    Step::Fail => {
                        failed = true;
                        Event::default().data(ERROR_SENTINEL)
                    }
                    Step::End => Event::default().data(END_SENTINEL),
                }))
            }))
        }
        Err(e) => {
            tracing::error!("chat request failed: {e}");
            Box::pin(tokio_stream::once(Ok(
                Event::default().data(ERROR_SENTINEL)
            )))
        }
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_response_serializes() {
        let resp = HealthResponse {
            status: "ok",
            uptime_secs: 42,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
    }

    #[test]
    fn chat_payload_deserializes_without_history() {
        let json = r#"{"query":"what about solar?"}"#;
        let payload: ChatPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.query, "what about solar?");
        assert!(payload.history.is_empty());
    }

    #[test]
    fn chat_payload_deserializes_with_history() {
        let json = r#"{"query":"next","history":[{"role":"user","content":"earlier"}]}"#;
        let payload: ChatPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.history.len(), 1);
        assert_eq!(payload.history[0].content, "earlier");
    }
}
