use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use super::coupon::{Coupon, CouponCode};
use crate::errors::ServiceError;

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserCouponStatus {
    Saved,
    Used,
    Expired,
    Invalid,
}

/// A coupon claimed into a user's wallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserCoupon {
    pub id: Uuid,
    pub user_id: Uuid,
    pub coupon_id: Uuid,
    pub code: CouponCode,
    pub status: UserCouponStatus,
    pub saved_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    /// Snapshot of the coupon's `end_at` when it was saved.
    pub expires_at: DateTime<Utc>,
}

impl UserCoupon {
    pub fn claim(user_id: Uuid, coupon: &Coupon, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            coupon_id: coupon.id,
            code: coupon.code.clone(),
            status: UserCouponStatus::Saved,
            saved_at: now,
            used_at: None,
            expires_at: coupon.end_at,
        }
    }

    /// Expiry is derived from the clock, never written back.
    pub fn effective_status(&self, now: DateTime<Utc>) -> UserCouponStatus {
        match self.status {
            UserCouponStatus::Saved if now > self.expires_at => UserCouponStatus::Expired,
            status => status,
        }
    }

    /// Whether the claim still occupies the user's wallet slot for its coupon.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.effective_status(now) == UserCouponStatus::Saved
    }

    pub fn mark_used(&mut self, now: DateTime<Utc>) -> Result<(), ServiceError> {
        match self.effective_status(now) {
            UserCouponStatus::Saved => {
                self.status = UserCouponStatus::Used;
                self.used_at = Some(now);
                Ok(())
            }
            other => Err(ServiceError::InvalidStatus(format!(
                "saved coupon {} is {} and cannot be used",
                self.code, other
            ))),
        }
    }

    /// Administrative correction; allowed from any state.
    pub fn invalidate(&mut self) {
        self.status = UserCouponStatus::Invalid;
    }
}
