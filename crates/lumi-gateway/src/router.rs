use axum::Router;
use axum::routing::{get, post};
use tower_http::limit::RequestBodyLimitLayer;

use super::handlers::{chat_handler, health_handler};
use super::server::AppState;

pub(crate) fn build_router(state: AppState, max_body_size: usize) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .route("/health", get(health_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use lumi_llm::any::AnyProvider;
    use lumi_llm::mock::MockProvider;
    use lumi_rag::store::{ChunkMeta, Index};

    fn test_state(provider: MockProvider) -> AppState {
        let index = Index {
            model: Some("mock-embedding".into()),
            embeddings: vec![vec![1.0, 0.0, 0.0, 0.0]],
            metas: vec![ChunkMeta {
                doc_id: "energy.md".into(),
                text: "solar panels convert sunlight".into(),
            }],
        };
        let provider = Arc::new(AnyProvider::Mock(provider));
        AppState {
            index: Arc::new(index),
            embedder: Arc::clone(&provider),
            chat: provider,
            top_k: 3,
            started_at: Instant::now(),
        }
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_owned()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = build_router(test_state(MockProvider::default()), 1_048_576);
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn chat_streams_answer_terminated_by_end_sentinel() {
        let provider = MockProvider::with_responses(vec!["hi".into()]);
        let app = build_router(test_state(provider), 1_048_576);

        let resp = app
            .oneshot(chat_request(r#"{"query":"solar?"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert!(
            resp.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("data: h"));
        assert!(text.contains("data: i"));
        assert!(text.ends_with("data: [END]\n\n"));
    }

    #[tokio::test]
    async fn chat_failure_degrades_to_error_sentinel() {
        let app = build_router(test_state(MockProvider::failing()), 1_048_576);

        let resp = app
            .oneshot(chat_request(r#"{"query":"solar?"}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("data: [ERROR]"));
        assert!(!text.contains("data: [END]"));
    }

    #[tokio::test]
    async fn oversized_body_rejected() {
        let app = build_router(test_state(MockProvider::default()), 64);
        let big = format!(r#"{{"query":"{}"}}"#, "x".repeat(256));
        let resp = app.oneshot(chat_request(&big)).await.unwrap();
        assert_eq!(resp.status(), 413);
    }

    #[tokio::test]
    async fn malformed_payload_rejected() {
        let app = build_router(test_state(MockProvider::default()), 1_048_576);
        let resp = app.oneshot(chat_request("not json")).await.unwrap();
        assert!(resp.status().is_client_error());
    }
}
