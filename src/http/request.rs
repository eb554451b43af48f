//! Request identity and context.
//!
//! # Responsibilities
//! - Assign a unique request ID (UUID v4) unless the client sent one
//! - Echo the ID back in the response headers
//! - Run the rest of the stack inside a request context for that ID
//! - Write one access line per request through the access logger
//!
//! # Design Decisions
//! - Request ID added as early as possible so every record carries it
//! - The context is a task-local scope around the handler future, so it
//!   survives every `.await` in the handler
//! - Access lines are pre-formatted here; the access sink writes them verbatim

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use uuid::Uuid;

use crate::observability::{context, ACCESS_LOGGER};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Wrap `router` so every request is handled inside its own request context.
pub fn with_request_context<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(middleware::from_fn(request_context))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Middleware running the request inside a context scope for its ID.
pub async fn request_context(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    context::scope(request_id.clone(), async move {
        let response = next.run(request).await;
        tracing::info!(
            target: ACCESS_LOGGER,
            "{} - {} {} - {} - {:.1}ms",
            request_id,
            method,
            uri,
            response.status().as_u16(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        response
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::filter::RequestContextFilter;
    use crate::observability::format::LineFormat;
    use crate::observability::testing::MemorySink;
    use crate::observability::{Handler, Level, Logger, Pipeline};
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use std::sync::Arc;
    use tower::ServiceExt;
    use tracing_subscriber::layer::SubscriberExt;

    fn app() -> Router {
        with_request_context(Router::new().route(
            "/whoami",
            get(|| async {
                tokio::task::yield_now().await;
                tracing::info!(target: "homeserver.rooms", "handling");
                context::current()
            }),
        ))
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_handler_sees_client_request_id() {
        let request = HttpRequest::builder()
            .uri("/whoami")
            .header(X_REQUEST_ID, "req-42")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "req-42");
        assert_eq!(body_text(response).await, "req-42");
    }

    #[tokio::test]
    async fn test_generated_request_id_is_echoed() {
        let request = HttpRequest::builder().uri("/whoami").body(Body::empty()).unwrap();

        let response = app().oneshot(request).await.unwrap();
        let header = response.headers()[X_REQUEST_ID].to_str().unwrap().to_string();
        assert!(Uuid::parse_str(&header).is_ok());
        assert_eq!(body_text(response).await, header);
        assert_eq!(context::current(), "");
    }

    #[tokio::test]
    async fn test_access_line_and_stamped_records() {
        let main = MemorySink::default();
        let access = MemorySink::default();
        let mut pipeline = Pipeline::new(
            Logger::root().with_level(Level::Info).with_handler(Arc::new(
                Handler::new(
                    "main",
                    Arc::new(main.clone()),
                    LineFormat::parse("{name}|{request}|{message}").unwrap(),
                )
                .with_filter(Arc::new(RequestContextFilter::new())),
            )),
        );
        pipeline.add_logger(Logger::new(ACCESS_LOGGER).with_handler(Arc::new(Handler::new(
            "access",
            Arc::new(access.clone()),
            LineFormat::message_only(),
        ))));
        let pipeline = Arc::new(pipeline);
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(pipeline.layer()));

        let request = HttpRequest::builder()
            .uri("/whoami")
            .header(X_REQUEST_ID, "req-7")
            .body(Body::empty())
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);

        let access_lines = access.lines();
        assert_eq!(access_lines.len(), 1);
        assert!(access_lines[0].starts_with("req-7 - GET /whoami - 200 - "));

        let main_lines = main.lines();
        assert_eq!(main_lines[0], "homeserver.rooms|req-7|handling");
        // Access records propagate to the main handler as well.
        assert!(main_lines[1].starts_with("homeserver.access|req-7|req-7 - GET /whoami"));
    }
}
