use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use super::discount::{compute_discount, compute_shipping_discount, provides_free_shipping};
use super::eligibility::{EligibilityChecker, EligibilityPolicy};
use super::stacking::{quote_order, OrderQuote};
use crate::auth::Session;
use crate::errors::ServiceError;
use crate::models::{
    Cart, CartItem, CheckoutContext, Coupon, CouponCode, CouponCondition, CouponLimits,
    CouponScope, CouponType, CustomerProfile, DiscountKind, DiscountRule, RawCondition, Redemption,
    UsageHistory, UserCoupon,
};
use crate::repositories::{
    CouponRepository, CustomerDirectory, InMemoryStore, PendingRedemption, RedemptionLedger,
    UserCouponRepository,
};

const REASON_NOT_FOUND: &str = "not_found";
const REASON_USAGE_LIMIT_REACHED: &str = "usage_limit_reached";

fn default_coupon_type() -> CouponType {
    CouponType::Voucher
}

fn default_true() -> bool {
    true
}

/// Input for defining a new coupon.
#[derive(Clone, Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponInput {
    #[validate(length(min = 3, max = 32))]
    pub code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(rename = "type", default = "default_coupon_type")]
    pub coupon_type: CouponType,
    #[validate(custom = "validate_discount_rule")]
    pub discount: DiscountRule,
    pub scope: Option<CouponScope>,
    #[serde(default)]
    #[schema(value_type = Vec<RawCondition>)]
    pub conditions: Vec<CouponCondition>,
    #[serde(default)]
    #[validate(custom = "validate_limits")]
    pub limits: CouponLimits,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CreateCouponInput {
    /// Field rules plus the checks that span several fields.
    pub fn validate_definition(&self) -> Result<(), ValidationErrors> {
        self.validate()?;

        if self.end_at <= self.start_at {
            let mut errors = ValidationErrors::new();
            let mut err = ValidationError::new("validity_window");
            err.message = Some("endAt must be after startAt".into());
            errors.add("end_at", err);
            return Err(errors);
        }
        Ok(())
    }
}

fn validate_discount_rule(rule: &DiscountRule) -> Result<(), ValidationError> {
    let problem = match rule.kind {
        DiscountKind::Percent if rule.value <= Decimal::ZERO || rule.value > dec!(100) => {
            Some("percent discounts need a value in (0, 100]")
        }
        DiscountKind::Fixed if rule.value <= Decimal::ZERO => {
            Some("fixed discounts need a positive value")
        }
        DiscountKind::Fixed if rule.value.fract() != Decimal::ZERO => {
            Some("fixed discounts must be whole VND")
        }
        _ if rule.max_discount.map_or(false, |cap| cap < 0) => {
            Some("maxDiscount must not be negative")
        }
        _ if rule.min_order_value.map_or(false, |min| min < 0) => {
            Some("minOrderValue must not be negative")
        }
        _ => None,
    };

    match problem {
        Some(message) => {
            let mut err = ValidationError::new("discount");
            err.message = Some(message.into());
            Err(err)
        }
        None => Ok(()),
    }
}

fn validate_limits(limits: &CouponLimits) -> Result<(), ValidationError> {
    if limits.usage_limit == Some(0) || limits.per_user_limit == Some(0) {
        let mut err = ValidationError::new("limits");
        err.message = Some("usage limits must be at least 1 when set".into());
        return Err(err);
    }
    Ok(())
}

/// Checkout facts shared by validate, redeem and quote requests.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInput {
    #[validate(range(min = 0, max = 1_000_000_000_000))]
    pub order_value: i64,
    #[serde(default)]
    #[validate]
    pub items: Vec<CartItem>,
    #[serde(default)]
    #[validate(range(min = 0, max = 1_000_000_000_000))]
    pub shipping_fee: i64,
    #[serde(default)]
    pub livestream: bool,
}

impl CheckoutInput {
    fn cart(&self) -> Cart {
        Cart::new(self.order_value, self.items.clone())
    }

    fn context(&self, now: DateTime<Utc>) -> CheckoutContext {
        CheckoutContext::at(now).with_livestream(self.livestream)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    #[serde(flatten)]
    #[validate]
    pub checkout: CheckoutInput,
}

/// Outcome of checking one code against a cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<Coupon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_discount: Option<i64>,
    pub free_shipping: bool,
    /// Machine-readable rejection code, e.g. `expired`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ValidateCouponResponse {
    fn rejected(coupon: Option<Coupon>, rejection: Rejection) -> Self {
        Self {
            valid: false,
            coupon,
            discount: None,
            shipping_discount: None,
            free_shipping: false,
            reason: Some(rejection.code.to_string()),
            message: Some(rejection.message),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedeemCouponRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
    pub order_id: Option<Uuid>,
    #[serde(flatten)]
    #[validate]
    pub checkout: CheckoutInput,
}

#[derive(Clone, Debug, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    #[validate(length(min = 1, max = 5))]
    pub codes: Vec<String>,
    #[serde(flatten)]
    #[validate]
    pub checkout: CheckoutInput,
}

/// Why a code cannot be applied to a checkout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejection {
    pub code: &'static str,
    pub message: String,
}

impl Rejection {
    fn not_found(raw: &str) -> Self {
        Self {
            code: REASON_NOT_FOUND,
            message: format!("coupon {} not found", raw.trim()),
        }
    }
}

/// Coupon operations for the current session.
///
/// The eligibility and discount functions are pure; this service feeds them
/// with a snapshot of the customer's profile and usage, and leaves limit
/// enforcement under concurrency to [`RedemptionLedger::record_redemption`].
#[derive(Clone)]
pub struct CouponService {
    coupons: Arc<dyn CouponRepository>,
    wallets: Arc<dyn UserCouponRepository>,
    ledger: Arc<dyn RedemptionLedger>,
    customers: Arc<dyn CustomerDirectory>,
    checker: EligibilityChecker,
}

impl CouponService {
    pub fn new(
        coupons: Arc<dyn CouponRepository>,
        wallets: Arc<dyn UserCouponRepository>,
        ledger: Arc<dyn RedemptionLedger>,
        customers: Arc<dyn CustomerDirectory>,
        policy: EligibilityPolicy,
    ) -> Self {
        Self {
            coupons,
            wallets,
            ledger,
            customers,
            checker: EligibilityChecker::new(policy),
        }
    }

    /// All four stores backed by one in-memory store.
    pub fn in_memory(store: InMemoryStore, policy: EligibilityPolicy) -> Self {
        let store = Arc::new(store);
        Self::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            policy,
        )
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        self.checker.policy()
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_coupon(&self, input: CreateCouponInput) -> Result<Coupon, ServiceError> {
        input.validate_definition()?;
        let code = CouponCode::parse(&input.code)?;
        let now = Utc::now();

        let coupon = Coupon {
            id: Uuid::new_v4(),
            code,
            name: input.name.trim().to_string(),
            description: input.description,
            coupon_type: input.coupon_type,
            discount: input.discount,
            scope: input.scope,
            conditions: input.conditions,
            limits: input.limits,
            usage_count: 0,
            start_at: input.start_at,
            end_at: input.end_at,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };

        let coupon = self.coupons.insert(coupon).await?;
        counter!("coupons.created", 1);
        info!(code = %coupon.code, id = %coupon.id, "coupon created");
        Ok(coupon)
    }

    pub async fn get_coupon(&self, raw_code: &str) -> Result<Coupon, ServiceError> {
        let code = CouponCode::parse(raw_code)?;
        self.coupons
            .find_by_code(&code)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("coupon {} not found", code)))
    }

    /// Kill switch.
    #[instrument(skip(self))]
    pub async fn set_active(&self, raw_code: &str, active: bool) -> Result<Coupon, ServiceError> {
        let code = CouponCode::parse(raw_code)?;
        let coupon = self.coupons.set_active(&code, active, Utc::now()).await?;
        info!(code = %coupon.code, active, "coupon activity changed");
        Ok(coupon)
    }

    /// Checks a code against the caller's cart. Rejections are answers, not
    /// errors: only malformed requests and store failures return `Err`.
    #[instrument(skip(self, session, request), fields(user_id = %session.user_id, code = %request.code))]
    pub async fn validate_coupon(
        &self,
        session: &Session,
        request: ValidateCouponRequest,
    ) -> Result<ValidateCouponResponse, ServiceError> {
        request.validate()?;
        let now = Utc::now();

        let coupon = match self.lookup(&request.code).await? {
            Some(coupon) => coupon,
            None => {
                counter!("coupons.validation.rejected", 1, "reason" => REASON_NOT_FOUND);
                return Ok(ValidateCouponResponse::rejected(
                    None,
                    Rejection::not_found(&request.code),
                ));
            }
        };

        if let Some(rejection) = self
            .assess(session.user_id, &coupon, &request.checkout, now)
            .await?
        {
            counter!("coupons.validation.rejected", 1, "reason" => rejection.code);
            return Ok(ValidateCouponResponse::rejected(Some(coupon), rejection));
        }

        let discount = compute_discount(&coupon, request.checkout.order_value);
        let shipping_discount = compute_shipping_discount(&coupon, request.checkout.shipping_fee);
        counter!("coupons.validation.accepted", 1);

        Ok(ValidateCouponResponse {
            valid: true,
            free_shipping: provides_free_shipping(&coupon),
            coupon: Some(coupon),
            discount: Some(discount),
            shipping_discount: Some(shipping_discount),
            reason: None,
            message: None,
        })
    }

    /// Claims a coupon into the caller's wallet.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn save_coupon(&self, session: &Session, raw_code: &str) -> Result<UserCoupon, ServiceError> {
        let coupon = self.get_coupon(raw_code).await?;
        let now = Utc::now();

        if !coupon.is_active {
            return Err(ServiceError::InvalidOperation(format!(
                "coupon {} is inactive",
                coupon.code
            )));
        }
        if now > coupon.end_at {
            return Err(ServiceError::InvalidOperation(format!(
                "coupon {} has expired",
                coupon.code
            )));
        }

        let claim = self
            .wallets
            .save(UserCoupon::claim(session.user_id, &coupon, now), now)
            .await?;
        counter!("coupons.saved", 1);
        info!(code = %coupon.code, user_coupon_id = %claim.id, "coupon saved");
        Ok(claim)
    }

    /// The caller's wallet, newest first, with expiry applied.
    pub async fn list_saved(&self, session: &Session) -> Result<Vec<UserCoupon>, ServiceError> {
        let now = Utc::now();
        let mut claims = self.wallets.list_for_user(session.user_id).await?;
        for claim in &mut claims {
            claim.status = claim.effective_status(now);
        }
        claims.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(claims)
    }

    /// Administrative correction of a customer's saved coupon.
    #[instrument(skip(self))]
    pub async fn invalidate_saved(&self, user_id: Uuid, claim_id: Uuid) -> Result<UserCoupon, ServiceError> {
        let claim = self.wallets.invalidate(user_id, claim_id).await?;
        counter!("coupons.saved.invalidated", 1);
        info!(code = %claim.code, user_coupon_id = %claim.id, "saved coupon invalidated");
        Ok(claim)
    }

    /// Applies a coupon to a completed order.
    #[instrument(skip(self, session, request), fields(user_id = %session.user_id, code = %request.code))]
    pub async fn redeem(
        &self,
        session: &Session,
        request: RedeemCouponRequest,
    ) -> Result<Redemption, ServiceError> {
        request.validate()?;
        let coupon = self.get_coupon(&request.code).await?;
        let now = Utc::now();

        if let Some(rejection) = self
            .assess(session.user_id, &coupon, &request.checkout, now)
            .await?
        {
            counter!("coupons.redemption.rejected", 1, "reason" => rejection.code);
            return Err(rejection_error(&coupon.code, rejection));
        }

        let pending = PendingRedemption {
            coupon_id: coupon.id,
            user_id: session.user_id,
            order_id: request.order_id,
            discount: compute_discount(&coupon, request.checkout.order_value),
            shipping_discount: compute_shipping_discount(&coupon, request.checkout.shipping_fee),
            now,
        };

        match self.ledger.record_redemption(pending).await {
            Ok(redemption) => {
                counter!("coupons.redemption.recorded", 1);
                info!(
                    redemption_id = %redemption.id,
                    discount = redemption.discount,
                    shipping_discount = redemption.shipping_discount,
                    "coupon redeemed"
                );
                Ok(redemption)
            }
            Err(e) => {
                counter!("coupons.redemption.rejected", 1, "reason" => "store");
                warn!(error = %e, "redemption refused by store");
                Err(e)
            }
        }
    }

    /// Prices an order with up to one merchandise and one shipping coupon.
    #[instrument(skip(self, session, request), fields(user_id = %session.user_id))]
    pub async fn quote(&self, session: &Session, request: QuoteRequest) -> Result<OrderQuote, ServiceError> {
        request.validate()?;
        let now = Utc::now();

        let mut coupons = Vec::with_capacity(request.codes.len());
        for raw in &request.codes {
            let coupon = self.get_coupon(raw).await?;
            if let Some(rejection) = self
                .assess(session.user_id, &coupon, &request.checkout, now)
                .await?
            {
                return Err(rejection_error(&coupon.code, rejection));
            }
            coupons.push(coupon);
        }

        let refs: Vec<&Coupon> = coupons.iter().collect();
        quote_order(request.checkout.order_value, request.checkout.shipping_fee, &refs)
    }

    async fn lookup(&self, raw_code: &str) -> Result<Option<Coupon>, ServiceError> {
        match CouponCode::parse(raw_code) {
            Ok(code) => self.coupons.find_by_code(&code).await,
            Err(_) => Ok(None),
        }
    }

    /// Customers with no profile yet are treated as brand-new accounts.
    async fn profile(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<CustomerProfile, ServiceError> {
        Ok(self
            .customers
            .find_profile(user_id)
            .await?
            .unwrap_or_else(|| CustomerProfile::new(user_id, now)))
    }

    async fn assess(
        &self,
        user_id: Uuid,
        coupon: &Coupon,
        checkout: &CheckoutInput,
        now: DateTime<Utc>,
    ) -> Result<Option<Rejection>, ServiceError> {
        let customer = self.profile(user_id, now).await?;
        let history = UsageHistory::new(self.ledger.user_usage_count(coupon.id, user_id).await?);

        let eligibility = self.checker.check(
            &customer,
            &checkout.cart(),
            coupon,
            &history,
            &checkout.context(now),
        );
        if let Some(reason) = eligibility.reason {
            return Ok(Some(Rejection {
                code: reason.code(),
                message: reason.to_string(),
            }));
        }

        if coupon.is_exhausted() {
            return Ok(Some(Rejection {
                code: REASON_USAGE_LIMIT_REACHED,
                message: format!("coupon {} has been fully redeemed", coupon.code),
            }));
        }
        Ok(None)
    }
}

fn rejection_error(code: &CouponCode, rejection: Rejection) -> ServiceError {
    let message = format!("coupon {} cannot be applied: {}", code, rejection.message);
    match rejection.code {
        REASON_USAGE_LIMIT_REACHED | "per_user_limit_reached" => ServiceError::Conflict(message),
        _ => ServiceError::InvalidOperation(message),
    }
}
