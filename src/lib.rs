//! Abbyumy coupon service
//!
//! Coupon definitions, eligibility checks, discount quotes, saved coupons and
//! redemption bookkeeping for the Abbyumy marketplace, served over HTTP.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod openapi;
pub mod repositories;
pub mod seed;
pub mod services;
pub mod tracing;

use axum::{extract::State, response::Json, routing::get, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use utoipa::ToSchema;

use crate::repositories::InMemoryStore;
use crate::services::coupons::CouponService;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub coupons: CouponService,
    pub store: InMemoryStore,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// State backed by a process-local store.
    pub fn in_memory(config: config::AppConfig, store: InMemoryStore) -> Self {
        let coupons = CouponService::in_memory(store.clone(), config.eligibility_policy());
        Self {
            config,
            coupons,
            store,
            started_at: Utc::now(),
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[derive(Serialize)]
struct HealthInfo {
    status: &'static str,
    version: &'static str,
    environment: String,
    uptime_seconds: i64,
    coupon_redemptions: usize,
}

/// Versioned API routes
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/coupons", handlers::coupons::coupons_routes())
        .nest("/me", handlers::coupons::me_routes())
        .nest("/users", handlers::coupons::wallet_admin_routes())
}

/// The full application with middleware, ready to serve.
///
/// Outermost first: request id, timeout, HTTP trace span, access log.
pub fn app_router(state: Arc<AppState>) -> Router {
    let timeout = state.config.request_timeout();

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::openapi_routes::<Arc<AppState>>())
        .layer(axum::middleware::from_fn(logging::logging_middleware))
        .layer(crate::tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        .layer(axum::middleware::from_fn(
            crate::tracing::request_id_middleware,
        ))
        .with_state(state)
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthInfo>> {
    Json(ApiResponse::success(HealthInfo {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        coupon_redemptions: state.store.redemption_count(),
    }))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }
}
