//! Demo HTTP server.
//!
//! # Responsibilities
//! - Serve a handful of routes that log from inside request handlers
//! - Wire the request-context middleware around every route
//! - Shut down gracefully on Ctrl+C

use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::http::request::with_request_context;
use crate::observability::{context, STORAGE_LOGGER};

/// HTTP server whose handlers exercise the logging pipeline.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new() -> Self {
        Self {
            router: Self::build_router(),
        }
    }

    fn build_router() -> Router {
        let routes = Router::new()
            .route("/", get(index))
            .route("/slow", get(slow))
            .route("/background", get(background));
        with_request_context(routes)
    }

    /// The router with middleware applied, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn index() -> &'static str {
    tracing::info!("Serving index");
    "ok\n"
}

/// Logs on both sides of a suspension point.
async fn slow() -> String {
    tracing::info!("Starting slow request");
    tokio::time::sleep(Duration::from_millis(50)).await;
    tracing::debug!(target: STORAGE_LOGGER, "Fetched rows");
    tracing::info!("Finished slow request");
    context::current()
}

/// Hands work to a spawned task that keeps the request's context.
async fn background() -> String {
    match context::spawn(async {
        tracing::info!("Background job running");
        context::current()
    })
    .await
    {
        Ok(request) => request,
        Err(e) => {
            tracing::error!(error = %e, "Background job failed");
            String::new()
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
