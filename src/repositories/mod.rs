//! Storage seams for coupons, wallets, redemptions and customer profiles.
//!
//! Usage limits need serialized writes, so enforcing `usageLimit` and
//! `perUserLimit` is the store's job ([`RedemptionLedger::record_redemption`]);
//! the eligibility checker only reads a snapshot of the counts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{Coupon, CouponCode, CustomerProfile, Redemption, UserCoupon};

pub mod memory;

pub use memory::InMemoryStore;

#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, ServiceError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, ServiceError>;
    /// Fails with `Conflict` when the code is taken.
    async fn insert(&self, coupon: Coupon) -> Result<Coupon, ServiceError>;
    async fn set_active(
        &self,
        code: &CouponCode,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Coupon, ServiceError>;
}

#[async_trait]
pub trait UserCouponRepository: Send + Sync {
    /// Fails with `Conflict` when the user already holds a live claim on the coupon.
    async fn save(&self, claim: UserCoupon, now: DateTime<Utc>) -> Result<UserCoupon, ServiceError>;
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<UserCoupon>, ServiceError>;
    /// Marks one of the user's claims invalid. `NotFound` if the user holds no such claim.
    async fn invalidate(&self, user_id: Uuid, claim_id: Uuid) -> Result<UserCoupon, ServiceError>;
}

/// Input to [`RedemptionLedger::record_redemption`].
#[derive(Clone, Debug)]
pub struct PendingRedemption {
    pub coupon_id: Uuid,
    pub user_id: Uuid,
    pub order_id: Option<Uuid>,
    pub discount: i64,
    pub shipping_discount: i64,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait RedemptionLedger: Send + Sync {
    async fn user_usage_count(&self, coupon_id: Uuid, user_id: Uuid) -> Result<u32, ServiceError>;

    /// Atomically checks both usage limits, bumps the counters and consumes
    /// the user's live wallet claim for the coupon if there is one.
    async fn record_redemption(&self, pending: PendingRedemption) -> Result<Redemption, ServiceError>;
}

#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<CustomerProfile>, ServiceError>;
    async fn upsert_profile(&self, profile: CustomerProfile) -> Result<(), ServiceError>;
}
