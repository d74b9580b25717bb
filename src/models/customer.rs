use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerFollow {
    pub seller_id: Uuid,
    pub since: DateTime<Utc>,
}

/// The slice of a customer record coupon rules look at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_orders: u32,
    #[serde(default)]
    pub total_spent: i64,
    #[serde(default)]
    pub follows: Vec<SellerFollow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl CustomerProfile {
    /// A profile with no history, as seen for a first-time buyer.
    pub fn new(id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            completed_orders: 0,
            total_spent: 0,
            follows: Vec::new(),
            tier: None,
        }
    }

    pub fn followed_since(&self, seller_id: Uuid) -> Option<DateTime<Utc>> {
        self.follows
            .iter()
            .find(|follow| follow.seller_id == seller_id)
            .map(|follow| follow.since)
    }

    pub fn account_age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}

/// Prior redemptions of one coupon by one user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageHistory {
    pub used_count: u32,
}

impl UsageHistory {
    pub fn new(used_count: u32) -> Self {
        Self { used_count }
    }
}

/// Facts about the checkout itself rather than the customer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckoutContext {
    pub now: DateTime<Utc>,
    pub livestream: bool,
}

impl CheckoutContext {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            livestream: false,
        }
    }

    pub fn with_livestream(mut self, livestream: bool) -> Self {
        self.livestream = livestream;
        self
    }
}
