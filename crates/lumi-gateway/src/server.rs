use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;

use crate::error::GatewayError;
use crate::router::build_router;
use lumi_llm::any::AnyProvider;
use lumi_rag::store::Index;

#[derive(Clone)]
pub(crate) struct AppState {
    pub index: Arc<Index>,
    pub embedder: Arc<AnyProvider>,
    pub chat: Arc<AnyProvider>,
    pub top_k: usize,
    pub started_at: Instant,
}

pub struct RagServer {
    addr: SocketAddr,
    max_body_size: usize,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
}

impl RagServer {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        index: Arc<Index>,
        embedder: AnyProvider,
        chat: AnyProvider,
        top_k: usize,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        if bind == "0.0.0.0" {
            tracing::warn!("gateway binding to 0.0.0.0 — ensure this is intended for production");
        }

        Self {
            addr,
            max_body_size: 1_048_576,
            state: AppState {
                index,
                embedder: Arc::new(embedder),
                chat: Arc::new(chat),
                top_k,
                started_at: Instant::now(),
            },
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Start the HTTP gateway server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal
    /// I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let router = build_router(self.state, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("gateway listening on {}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                tracing::info!("gateway shutting down");
            })
            .await
            .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumi_llm::mock::MockProvider;

    fn empty_index() -> Arc<Index> {
        Arc::new(Index {
            model: Some("mock-embedding".into()),
            embeddings: vec![],
            metas: vec![],
        })
    }

    #[test]
    fn server_builder_chain() {
        let (_stx, srx) = watch::channel(false);
        let provider = AnyProvider::Mock(MockProvider::default());
        let server = RagServer::new(
            "127.0.0.1",
            8090,
            empty_index(),
            provider.clone(),
            provider,
            6,
            srx,
        )
        .with_max_body_size(512);

        assert_eq!(server.max_body_size, 512);
        assert_eq!(server.addr.port(), 8090);
    }

    #[test]
    fn server_invalid_bind_fallback() {
        let (_stx, srx) = watch::channel(false);
        let provider = AnyProvider::Mock(MockProvider::default());
        let server = RagServer::new(
            "not_an_ip",
            9999,
            empty_index(),
            provider.clone(),
            provider,
            6,
            srx,
        );
        assert_eq!(server.addr.port(), 9999);
        assert!(server.addr.ip().is_loopback());
    }
}
