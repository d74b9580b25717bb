use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

/// Access log: one structured event per handled request.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let duration_ms = start_time.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    let request_id = crate::tracing::current_request_id()
        .map(|rid| rid.0)
        .unwrap_or_default();

    if response.status().is_server_error() {
        warn!(%method, %path, status, duration_ms, %request_id, "HTTP request failed");
    } else {
        info!(%method, %path, status, duration_ms, %request_id, "HTTP request handled");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use tower::ServiceExt;

    #[tokio::test]
    async fn passes_responses_through() {
        let app = Router::new()
            .route("/health", get(|| async { "OK" }))
            .layer(axum::middleware::from_fn(logging_middleware));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
