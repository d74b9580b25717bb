use axum::{routing::get, Json, Router};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use crate::auth::USER_ID_HEADER;

pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Abbyumy Coupon API",
        version = "1.0.0",
        description = r#"
# Abbyumy Coupons

Coupon definitions, eligibility checks, discount quotes, saved coupons and
redemptions for the Abbyumy marketplace.

## Authentication

The gateway authenticates callers and forwards their identity:

```
x-user-id: <uuid>
x-user-role: admin | moderator | seller | user
x-user-permissions: coupons:read,reports:read
```

## Money

All amounts are whole VND.

## Error Handling

Errors share one body shape:

```json
{
  "error": "Not Found",
  "message": "Not found: coupon SUMMER20 not found",
  "request_id": "3f0c...",
  "timestamp": "2025-01-01T00:00:00Z"
}
```

A coupon that does not apply to a cart is not an error: `POST /coupons/validate`
answers `valid: false` with a `reason` code and message.
"#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    modifiers(&SessionHeaders),
    tags(
        (name = "Coupons", description = "Coupon administration"),
        (name = "Checkout", description = "Validation, quotes and redemption"),
        (name = "Wallet", description = "Saved coupons")
    ),
    paths(
        crate::handlers::coupons::create_coupon,
        crate::handlers::coupons::get_coupon,
        crate::handlers::coupons::activate_coupon,
        crate::handlers::coupons::deactivate_coupon,
        crate::handlers::coupons::validate_coupon,
        crate::handlers::coupons::quote_order,
        crate::handlers::coupons::redeem_coupon,
        crate::handlers::coupons::save_coupon,
        crate::handlers::coupons::list_my_coupons,
        crate::handlers::coupons::invalidate_saved_coupon,
    ),
    components(
        schemas(
            crate::models::Coupon,
            crate::models::CouponCode,
            crate::models::CouponType,
            crate::models::DiscountKind,
            crate::models::DiscountRule,
            crate::models::CouponScope,
            crate::models::CouponLimits,
            crate::models::RawCondition,
            crate::models::UserCoupon,
            crate::models::UserCouponStatus,
            crate::models::Redemption,
            crate::models::Cart,
            crate::models::CartItem,
            crate::services::coupons::CreateCouponInput,
            crate::services::coupons::CheckoutInput,
            crate::services::coupons::ValidateCouponRequest,
            crate::services::coupons::ValidateCouponResponse,
            crate::services::coupons::RedeemCouponRequest,
            crate::services::coupons::QuoteRequest,
            crate::services::coupons::OrderQuote,
            crate::errors::ErrorResponse
        )
    ),
    security(("UserId" = []))
)]
pub struct ApiDocV1;

struct SessionHeaders;

impl Modify for SessionHeaders {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "UserId",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(USER_ID_HEADER))),
        );
    }
}

/// Serves the generated document as JSON.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        OPENAPI_JSON_PATH,
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_coupon_paths() {
        let doc = ApiDocV1::openapi();
        for path in [
            "/api/v1/coupons",
            "/api/v1/coupons/{code}",
            "/api/v1/coupons/validate",
            "/api/v1/coupons/redeem",
            "/api/v1/me/coupons",
            "/api/v1/users/{user_id}/coupons/{claim_id}/invalidate",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn document_serializes() {
        let json = serde_json::to_value(ApiDocV1::openapi()).unwrap();
        assert_eq!(json["info"]["title"], "Abbyumy Coupon API");
        assert!(json["components"]["securitySchemes"]["UserId"].is_object());
    }
}
