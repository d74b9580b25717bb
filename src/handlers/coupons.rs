use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    auth::{permissions::consts, AuthRouterExt, Session},
    errors::ApiError,
    services::coupons::{
        CreateCouponInput, OrderQuote, QuoteRequest, RedeemCouponRequest, ValidateCouponRequest,
        ValidateCouponResponse,
    },
    models::{Coupon, Redemption, UserCoupon},
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Routes mounted under `/api/v1/coupons`
pub fn coupons_routes() -> Router<Arc<AppState>> {
    let create = Router::new()
        .route("/", post(create_coupon))
        .with_permission(consts::COUPONS_CREATE);

    let read = Router::new()
        .route("/:code", get(get_coupon))
        .with_permission(consts::COUPONS_READ);

    let update = Router::new()
        .route("/:code/activate", post(activate_coupon))
        .route("/:code/deactivate", post(deactivate_coupon))
        .with_permission(consts::COUPONS_UPDATE);

    let checkout = Router::new()
        .route("/validate", post(validate_coupon))
        .route("/quote", post(quote_order))
        .route("/redeem", post(redeem_coupon))
        .route("/:code/save", post(save_coupon))
        .with_auth();

    Router::new()
        .merge(create)
        .merge(read)
        .merge(update)
        .merge(checkout)
}

/// Routes scoped to the caller, mounted under `/api/v1/me`
pub fn me_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/coupons", get(list_my_coupons))
        .with_auth()
}

/// Back-office routes over customers' wallets, mounted under `/api/v1/users`
pub fn wallet_admin_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/:user_id/coupons/:claim_id/invalidate",
            post(invalidate_saved_coupon),
        )
        .with_permission(consts::COUPONS_UPDATE)
}

/// Define a coupon
#[utoipa::path(
    post,
    path = "/api/v1/coupons",
    request_body = CreateCouponInput,
    responses(
        (status = 201, description = "Coupon created", body = ApiResponse<Coupon>),
        (status = 400, description = "Malformed coupon definition", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 409, description = "Code already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "Coupons"
)]
pub async fn create_coupon(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCouponInput>,
) -> Result<impl IntoResponse, ApiError> {
    let coupon = state
        .coupons
        .create_coupon(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(coupon))
}

/// Fetch a coupon by code
#[utoipa::path(
    get,
    path = "/api/v1/coupons/{code}",
    params(("code" = String, Path, description = "Coupon code, case-insensitive")),
    responses(
        (status = 200, description = "Coupon found", body = ApiResponse<Coupon>),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Coupons"
)]
pub async fn get_coupon(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let coupon = state
        .coupons
        .get_coupon(&code)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(coupon))
}

#[utoipa::path(
    post,
    path = "/api/v1/coupons/{code}/activate",
    params(("code" = String, Path, description = "Coupon code")),
    responses(
        (status = 200, description = "Coupon activated", body = ApiResponse<Coupon>),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Coupons"
)]
pub async fn activate_coupon(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let coupon = state
        .coupons
        .set_active(&code, true)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(coupon))
}

#[utoipa::path(
    post,
    path = "/api/v1/coupons/{code}/deactivate",
    params(("code" = String, Path, description = "Coupon code")),
    responses(
        (status = 200, description = "Coupon deactivated", body = ApiResponse<Coupon>),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Coupons"
)]
pub async fn deactivate_coupon(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let coupon = state
        .coupons
        .set_active(&code, false)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(coupon))
}

/// Check a code against the caller's cart.
///
/// Ineligible coupons answer 200 with `valid: false` and a reason.
#[utoipa::path(
    post,
    path = "/api/v1/coupons/validate",
    request_body = ValidateCouponRequest,
    responses(
        (status = 200, description = "Validation outcome", body = ApiResponse<ValidateCouponResponse>),
        (status = 400, description = "Malformed request", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn validate_coupon(
    session: Session,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ValidateCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .coupons
        .validate_coupon(&session, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(outcome))
}

/// Price an order with up to one merchandise and one shipping coupon
#[utoipa::path(
    post,
    path = "/api/v1/coupons/quote",
    request_body = QuoteRequest,
    responses(
        (status = 200, description = "Order quote", body = ApiResponse<OrderQuote>),
        (status = 400, description = "A coupon does not apply or coupons cannot be combined", body = crate::errors::ErrorResponse),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn quote_order(
    session: Session,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let quote = state
        .coupons
        .quote(&session, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(quote))
}

/// Record a coupon against a completed order
#[utoipa::path(
    post,
    path = "/api/v1/coupons/redeem",
    request_body = RedeemCouponRequest,
    responses(
        (status = 201, description = "Redemption recorded", body = ApiResponse<Redemption>),
        (status = 400, description = "Coupon does not apply", body = crate::errors::ErrorResponse),
        (status = 404, description = "Coupon not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Usage limit reached", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn redeem_coupon(
    session: Session,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RedeemCouponRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let redemption = state
        .coupons
        .redeem(&session, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(redemption))
}

/// Claim a coupon into the caller's wallet
#[utoipa::path(
    post,
    path = "/api/v1/coupons/{code}/save",
    params(("code" = String, Path, description = "Coupon code")),
    responses(
        (status = 201, description = "Coupon saved", body = ApiResponse<UserCoupon>),
        (status = 400, description = "Coupon inactive or expired", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already saved", body = crate::errors::ErrorResponse)
    ),
    tag = "Wallet"
)]
pub async fn save_coupon(
    session: Session,
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let claim = state
        .coupons
        .save_coupon(&session, &code)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(claim))
}

/// The caller's saved coupons
#[utoipa::path(
    get,
    path = "/api/v1/me/coupons",
    responses(
        (status = 200, description = "Saved coupons, newest first", body = ApiResponse<Vec<UserCoupon>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "Wallet"
)]
pub async fn list_my_coupons(
    session: Session,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state
        .coupons
        .list_saved(&session)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(claims))
}

/// Invalidate a customer's saved coupon
#[utoipa::path(
    post,
    path = "/api/v1/users/{user_id}/coupons/{claim_id}/invalidate",
    params(
        ("user_id" = Uuid, Path, description = "Wallet owner"),
        ("claim_id" = Uuid, Path, description = "Saved coupon id")
    ),
    responses(
        (status = 200, description = "Saved coupon invalidated", body = ApiResponse<UserCoupon>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Saved coupon not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Wallet"
)]
pub async fn invalidate_saved_coupon(
    State(state): State<Arc<AppState>>,
    Path((user_id, claim_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let claim = state
        .coupons
        .invalidate_saved(user_id, claim_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(claim))
}
