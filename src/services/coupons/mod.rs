//! Coupon eligibility, discount math and the service that ties them to storage.

pub mod discount;
pub mod eligibility;
pub mod service;
pub mod stacking;

pub use discount::{compute_discount, compute_shipping_discount, provides_free_shipping};
pub use eligibility::{
    Eligibility, EligibilityChecker, EligibilityPolicy, IneligibleReason, UnknownRulePolicy,
    DEFAULT_NEW_USER_MAX_AGE_DAYS,
};
pub use service::{
    CheckoutInput, CouponService, CreateCouponInput, QuoteRequest, RedeemCouponRequest, Rejection,
    ValidateCouponRequest, ValidateCouponResponse,
};
pub use stacking::{quote_order, OrderQuote};
