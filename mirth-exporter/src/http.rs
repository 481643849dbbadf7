//! HTTP server for the Prometheus metrics endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::collector::{MirthCollector, SharedCollector};
use crate::fetcher::ReportFetcher;

/// Application state shared across handlers.
struct AppState<F> {
    collector: SharedCollector<F>,
    metrics_path: Arc<str>,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            collector: Arc::clone(&self.collector),
            metrics_path: Arc::clone(&self.metrics_path),
        }
    }
}

/// Create the HTTP router.
fn create_router<F>(collector: SharedCollector<F>, metrics_path: &str) -> Router
where
    F: ReportFetcher + 'static,
{
    let state = AppState {
        collector,
        metrics_path: Arc::from(metrics_path),
    };

    Router::new()
        .route("/", get(root_handler::<F>))
        .route(metrics_path, get(metrics_handler::<F>))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for the landing page.
async fn root_handler<F>(State(state): State<AppState<F>>) -> Html<String> {
    Html(landing_page(&state.metrics_path))
}

/// Handler for the metrics endpoint; runs one scrape per request.
async fn metrics_handler<F: ReportFetcher>(State(state): State<AppState<F>>) -> Response {
    let body = state.collector.scrape().await;

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

fn landing_page(metrics_path: &str) -> String {
    format!(
        "<html>
<head><title>Mirth Exporter</title></head>
<body>
<h1>Mirth Exporter</h1>
<p><a href='{}'>Metrics</a></p>
</body>
</html>
",
        metrics_path
    )
}

/// HTTP server configuration.
pub struct HttpServer<F> {
    collector: SharedCollector<F>,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl<F: ReportFetcher + 'static> HttpServer<F> {
    /// Create a new HTTP server.
    pub fn new(
        collector: Arc<MirthCollector<F>>,
        listen_addr: SocketAddr,
        metrics_path: String,
    ) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path,
        }
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> anyhow::Result<tokio::net::TcpListener> {
        tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until the shutdown signal is received.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        let router = create_router(self.collector, &self.metrics_path);

        info!(
            addr = %addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        // Run server with graceful shutdown
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
