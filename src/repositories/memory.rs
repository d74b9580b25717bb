use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    CouponRepository, CustomerDirectory, PendingRedemption, RedemptionLedger, UserCouponRepository,
};
use crate::errors::ServiceError;
use crate::models::{Coupon, CouponCode, CustomerProfile, Redemption, UserCoupon};

/// Process-local store backing every repository trait.
///
/// Lock order is codes, coupons, per-user counters, then wallets. Every
/// method that holds more than one shard lock takes them in that order.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    coupons: Arc<DashMap<Uuid, Coupon>>,
    codes: Arc<DashMap<CouponCode, Uuid>>,
    per_user_usage: Arc<DashMap<(Uuid, Uuid), u32>>,
    wallets: Arc<DashMap<Uuid, Vec<UserCoupon>>>,
    redemptions: Arc<DashMap<Uuid, Redemption>>,
    customers: Arc<DashMap<Uuid, CustomerProfile>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redemption_count(&self) -> usize {
        self.redemptions.len()
    }
}

#[async_trait]
impl CouponRepository for InMemoryStore {
    async fn find_by_code(&self, code: &CouponCode) -> Result<Option<Coupon>, ServiceError> {
        let id = match self.codes.get(code) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.coupons.get(&id).map(|c| c.clone()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Coupon>, ServiceError> {
        Ok(self.coupons.get(&id).map(|c| c.clone()))
    }

    async fn insert(&self, coupon: Coupon) -> Result<Coupon, ServiceError> {
        match self.codes.entry(coupon.code.clone()) {
            Entry::Occupied(_) => Err(ServiceError::Conflict(format!(
                "coupon code {} already exists",
                coupon.code
            ))),
            Entry::Vacant(slot) => {
                self.coupons.insert(coupon.id, coupon.clone());
                slot.insert(coupon.id);
                debug!(code = %coupon.code, id = %coupon.id, "coupon stored");
                Ok(coupon)
            }
        }
    }

    async fn set_active(
        &self,
        code: &CouponCode,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<Coupon, ServiceError> {
        let id = self
            .codes
            .get(code)
            .map(|id| *id)
            .ok_or_else(|| ServiceError::NotFound(format!("coupon {} not found", code)))?;
        let mut coupon = self
            .coupons
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("coupon {} not found", code)))?;
        coupon.is_active = active;
        coupon.updated_at = now;
        Ok(coupon.clone())
    }
}

#[async_trait]
impl UserCouponRepository for InMemoryStore {
    async fn save(&self, claim: UserCoupon, now: DateTime<Utc>) -> Result<UserCoupon, ServiceError> {
        let mut wallet = self.wallets.entry(claim.user_id).or_default();
        if wallet
            .iter()
            .any(|held| held.coupon_id == claim.coupon_id && held.is_live(now))
        {
            return Err(ServiceError::Conflict(format!(
                "coupon {} is already saved",
                claim.code
            )));
        }
        wallet.push(claim.clone());
        Ok(claim)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<UserCoupon>, ServiceError> {
        Ok(self
            .wallets
            .get(&user_id)
            .map(|wallet| wallet.clone())
            .unwrap_or_default())
    }

    async fn invalidate(&self, user_id: Uuid, claim_id: Uuid) -> Result<UserCoupon, ServiceError> {
        let not_found = || ServiceError::NotFound(format!("saved coupon {} not found", claim_id));
        let mut wallet = self.wallets.get_mut(&user_id).ok_or_else(not_found)?;
        let claim = wallet
            .iter_mut()
            .find(|held| held.id == claim_id)
            .ok_or_else(not_found)?;
        claim.invalidate();
        Ok(claim.clone())
    }
}

#[async_trait]
impl RedemptionLedger for InMemoryStore {
    async fn user_usage_count(&self, coupon_id: Uuid, user_id: Uuid) -> Result<u32, ServiceError> {
        Ok(self
            .per_user_usage
            .get(&(coupon_id, user_id))
            .map(|count| *count)
            .unwrap_or(0))
    }

    async fn record_redemption(&self, pending: PendingRedemption) -> Result<Redemption, ServiceError> {
        let mut coupon = self.coupons.get_mut(&pending.coupon_id).ok_or_else(|| {
            ServiceError::NotFound(format!("coupon {} not found", pending.coupon_id))
        })?;

        if coupon.is_exhausted() {
            warn!(code = %coupon.code, "coupon has reached its usage limit");
            return Err(ServiceError::Conflict(format!(
                "coupon {} has been fully redeemed",
                coupon.code
            )));
        }

        let mut used = self
            .per_user_usage
            .entry((pending.coupon_id, pending.user_id))
            .or_insert(0);
        if let Some(limit) = coupon.limits.per_user_limit {
            if *used >= limit {
                return Err(ServiceError::Conflict(format!(
                    "coupon {} already used {} time(s) by this user",
                    coupon.code, *used
                )));
            }
        }

        let user_coupon_id = self.wallets.get_mut(&pending.user_id).and_then(|mut wallet| {
            wallet
                .iter_mut()
                .find(|held| held.coupon_id == pending.coupon_id && held.is_live(pending.now))
                .and_then(|held| held.mark_used(pending.now).ok().map(|_| held.id))
        });

        coupon.usage_count += 1;
        coupon.updated_at = pending.now;
        *used += 1;

        let redemption = Redemption {
            id: Uuid::new_v4(),
            coupon_id: coupon.id,
            code: coupon.code.clone(),
            user_id: pending.user_id,
            order_id: pending.order_id,
            discount: pending.discount,
            shipping_discount: pending.shipping_discount,
            user_coupon_id,
            redeemed_at: pending.now,
        };
        self.redemptions.insert(redemption.id, redemption.clone());
        Ok(redemption)
    }
}

#[async_trait]
impl CustomerDirectory for InMemoryStore {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<CustomerProfile>, ServiceError> {
        Ok(self.customers.get(&user_id).map(|p| p.clone()))
    }

    async fn upsert_profile(&self, profile: CustomerProfile) -> Result<(), ServiceError> {
        self.customers.insert(profile.id, profile);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CouponLimits, CouponType, DiscountRule, UserCouponStatus};
    use chrono::Duration;

    fn coupon(code: &str, limits: CouponLimits) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: Uuid::new_v4(),
            code: CouponCode::parse(code).unwrap(),
            name: code.into(),
            description: None,
            coupon_type: CouponType::Voucher,
            discount: DiscountRule::fixed(5_000),
            scope: None,
            conditions: vec![],
            limits,
            usage_count: 0,
            start_at: now - Duration::days(1),
            end_at: now + Duration::days(1),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn pending(coupon_id: Uuid, user_id: Uuid) -> PendingRedemption {
        PendingRedemption {
            coupon_id,
            user_id,
            order_id: None,
            discount: 5_000,
            shipping_discount: 0,
            now: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_codes_conflict() {
        let store = InMemoryStore::new();
        store.insert(coupon("DUP01", CouponLimits::default())).await.unwrap();
        let err = store
            .insert(coupon("dup01", CouponLimits::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn usage_limit_is_enforced_on_record() {
        let store = InMemoryStore::new();
        let c = store
            .insert(coupon(
                "ONCE",
                CouponLimits {
                    usage_limit: Some(1),
                    per_user_limit: None,
                },
            ))
            .await
            .unwrap();

        store.record_redemption(pending(c.id, Uuid::new_v4())).await.unwrap();
        let err = store
            .record_redemption(pending(c.id, Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(store.redemption_count(), 1);
    }

    #[tokio::test]
    async fn per_user_limit_is_enforced_on_record() {
        let store = InMemoryStore::new();
        let c = store
            .insert(coupon(
                "PERUSER",
                CouponLimits {
                    usage_limit: None,
                    per_user_limit: Some(1),
                },
            ))
            .await
            .unwrap();
        let user = Uuid::new_v4();

        store.record_redemption(pending(c.id, user)).await.unwrap();
        assert_eq!(store.user_usage_count(c.id, user).await.unwrap(), 1);
        assert!(store.record_redemption(pending(c.id, user)).await.is_err());
        assert!(store
            .record_redemption(pending(c.id, Uuid::new_v4()))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn redemption_consumes_live_claim() {
        let store = InMemoryStore::new();
        let c = store.insert(coupon("CLAIMED", CouponLimits::default())).await.unwrap();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let claim = store.save(UserCoupon::claim(user, &c, now), now).await.unwrap();

        let redemption = store.record_redemption(pending(c.id, user)).await.unwrap();
        assert_eq!(redemption.user_coupon_id, Some(claim.id));

        let wallet = store.list_for_user(user).await.unwrap();
        assert_eq!(wallet[0].status, UserCouponStatus::Used);
    }

    #[tokio::test]
    async fn invalidated_claim_frees_the_wallet_slot() {
        let store = InMemoryStore::new();
        let c = store.insert(coupon("REVOKED", CouponLimits::default())).await.unwrap();
        let user = Uuid::new_v4();
        let now = Utc::now();
        let claim = store.save(UserCoupon::claim(user, &c, now), now).await.unwrap();

        let revoked = store.invalidate(user, claim.id).await.unwrap();
        assert_eq!(revoked.status, UserCouponStatus::Invalid);
        assert!(store.save(UserCoupon::claim(user, &c, now), now).await.is_ok());

        assert!(matches!(
            store.invalidate(Uuid::new_v4(), claim.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_redemptions_respect_usage_limit() {
        let store = InMemoryStore::new();
        let c = store
            .insert(coupon(
                "RACE",
                CouponLimits {
                    usage_limit: Some(5),
                    per_user_limit: None,
                },
            ))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            let id = c.id;
            handles.push(tokio::spawn(async move {
                store.record_redemption(pending(id, Uuid::new_v4())).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 5);
        assert_eq!(store.find_by_id(c.id).await.unwrap().unwrap().usage_count, 5);
    }
}
