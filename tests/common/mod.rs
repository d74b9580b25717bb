#![allow(dead_code)]

use std::sync::Arc;

use abbyumy_api::{
    app_router,
    auth::{USER_ID_HEADER, USER_ROLE_HEADER},
    config::AppConfig,
    models::CustomerProfile,
    repositories::{CustomerDirectory, InMemoryStore},
    AppState,
};
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

/// Router plus the store behind it, with a fresh identity per role.
pub struct TestApp {
    router: Router,
    pub store: InMemoryStore,
    pub admin_id: Uuid,
    pub customer_id: Uuid,
}

impl TestApp {
    pub fn new() -> Self {
        let cfg = AppConfig::new("127.0.0.1".to_string(), 18_080, "test".to_string());
        let store = InMemoryStore::new();
        let state = AppState::in_memory(cfg, store.clone());

        Self {
            router: app_router(Arc::new(state)),
            store,
            admin_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn upsert_customer(&self, profile: CustomerProfile) {
        self.store
            .upsert_profile(profile)
            .await
            .expect("profile stored");
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        identity: Option<(Uuid, &str)>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((user_id, role)) = identity {
            builder = builder
                .header(USER_ID_HEADER, user_id.to_string())
                .header(USER_ROLE_HEADER, role);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds")
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, Some((self.admin_id, "admin")), body)
            .await
    }

    pub async fn as_customer(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, Some((self.customer_id, "user")), body)
            .await
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
