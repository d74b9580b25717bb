use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::coupon::CouponCode;

/// One recorded use of a coupon on an order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub id: Uuid,
    pub coupon_id: Uuid,
    pub code: CouponCode,
    pub user_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    pub discount: i64,
    pub shipping_discount: i64,
    /// Claimed wallet entry consumed by this redemption, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_coupon_id: Option<Uuid>,
    pub redeemed_at: DateTime<Utc>,
}
