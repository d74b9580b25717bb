/*!
 * # Authentication & Session Module
 *
 * Identity is established upstream by the gateway, which forwards it as
 * headers. `auth_middleware` turns those headers into a [`Session`] and
 * injects it into the request so handlers receive the current user as an
 * explicit argument instead of looking it up globally.
 *
 * | Header               | Meaning                                  |
 * |----------------------|------------------------------------------|
 * | `x-user-id`          | UUID of the signed-in user (required)    |
 * | `x-user-role`        | built-in role, defaults to `user`        |
 * | `x-user-permissions` | comma separated custom permission grants |
 */

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::ErrorResponse;

pub mod permissions;
pub mod rbac;

pub use rbac::RbacService;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_PERMISSIONS_HEADER: &str = "x-user-permissions";
pub const DEFAULT_ROLE: &str = "user";

/// The current caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: Uuid,
    pub role: String,
    #[serde(default)]
    pub custom_permissions: Vec<String>,
}

impl Session {
    pub fn new(user_id: Uuid, role: impl Into<String>) -> Self {
        Self {
            user_id,
            role: role.into(),
            custom_permissions: Vec::new(),
        }
    }

    /// Role permissions merged with custom grants.
    pub fn permissions(&self) -> BTreeSet<String> {
        RbacService::new().effective_permissions(&self.role, &self.custom_permissions)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        RbacService::new().check_permission(&self.permissions(), permission)
    }

    /// Reads a session from gateway headers.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AuthError> {
        let raw_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingAuth)?;
        let user_id = Uuid::parse_str(raw_id).map_err(|_| AuthError::InvalidIdentity)?;

        let role = headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());

        let custom_permissions = headers
            .get(USER_PERMISSIONS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            user_id,
            role,
            custom_permissions,
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid user identity")]
    InvalidIdentity,

    #[error("Insufficient permissions")]
    InsufficientPermissions,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication required",
            ),
            Self::InvalidIdentity => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_IDENTITY",
                "User identity header is not a valid UUID",
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_INSUFFICIENT_PERMISSIONS",
                "Insufficient permissions",
            ),
        };

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: message.to_string(),
            details: Some(error_code.to_string()),
            request_id: crate::tracing::current_request_id().map(|rid| rid.0),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}

/// Builds the [`Session`] and stores it in the request extensions.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    match Session::from_headers(request.headers()) {
        Ok(session) => {
            debug!(user_id = %session.user_id, role = %session.role, "session established");
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Rejects sessions lacking `required_permission`.
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let session = request
        .extensions()
        .get::<Session>()
        .ok_or(AuthError::MissingAuth)?;

    if !session.has_permission(&required_permission) {
        warn!(
            user_id = %session.user_id,
            role = %session.role,
            permission = %required_permission,
            "permission denied"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Router extension for gating routes
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, value.parse().unwrap());
        }
        map
    }

    #[test]
    fn session_defaults_to_user_role() {
        let id = Uuid::new_v4();
        let raw = id.to_string();
        let session = Session::from_headers(&headers(&[(USER_ID_HEADER, raw.as_str())])).unwrap();
        assert_eq!(session.user_id, id);
        assert_eq!(session.role, "user");
        assert!(session.custom_permissions.is_empty());
    }

    #[test]
    fn session_parses_custom_permissions() {
        let id = Uuid::new_v4().to_string();
        let session = Session::from_headers(&headers(&[
            (USER_ID_HEADER, id.as_str()),
            (USER_ROLE_HEADER, "Seller"),
            (USER_PERMISSIONS_HEADER, "reports:read, ,users:read"),
        ]))
        .unwrap();
        assert_eq!(session.role, "seller");
        assert_eq!(session.custom_permissions, vec!["reports:read", "users:read"]);
        assert!(session.has_permission("users:read"));
        assert!(session.has_permission("coupons:create"));
    }

    #[test]
    fn missing_or_bad_identity_is_rejected() {
        assert!(matches!(
            Session::from_headers(&HeaderMap::new()),
            Err(AuthError::MissingAuth)
        ));
        assert!(matches!(
            Session::from_headers(&headers(&[(USER_ID_HEADER, "not-a-uuid")])),
            Err(AuthError::InvalidIdentity)
        ));
    }

    fn gated() -> Router {
        Router::new()
            .route(
                "/",
                get(|session: Session| async move { session.user_id.to_string() }),
            )
            .with_permission("coupons:create")
    }

    #[tokio::test]
    async fn permission_gate_enforces_role() {
        let id = Uuid::new_v4().to_string();
        let denied = gated()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header(USER_ID_HEADER, &id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let allowed = gated()
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .header(USER_ID_HEADER, &id)
                    .header(USER_ROLE_HEADER, "seller")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unauthenticated_requests_get_401() {
        let response = gated()
            .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
