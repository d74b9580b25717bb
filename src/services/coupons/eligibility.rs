//! Coupon eligibility rules.
//!
//! Checks run in a fixed order and the first failure wins:
//! activity and validity window, seller scope, minimum order value, the
//! coupon's own conditions in declaration order, then the per-user limit.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::IntoStaticStr;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Cart, CheckoutContext, Coupon, CouponCondition, CustomerProfile, UsageHistory};

pub const DEFAULT_NEW_USER_MAX_AGE_DAYS: i64 = 30;

/// What to do with a condition whose rule this build does not understand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRulePolicy {
    Allow,
    #[default]
    Deny,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EligibilityPolicy {
    pub new_user_max_age: Duration,
    pub unknown_rules: UnknownRulePolicy,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            new_user_max_age: Duration::days(DEFAULT_NEW_USER_MAX_AGE_DAYS),
            unknown_rules: UnknownRulePolicy::Deny,
        }
    }
}

/// Why a coupon cannot be applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, IntoStaticStr)]
#[serde(tag = "code", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IneligibleReason {
    Inactive,
    NotStarted,
    Expired,
    NotApplicableToCart { seller_id: Uuid },
    BelowMinimumOrder { minimum: i64, shortfall: i64 },
    NotFollowingSeller { seller_id: Option<Uuid> },
    FollowDurationTooShort { required_days: u32, actual_days: i64 },
    InsufficientCompletedOrders { required: u32, actual: u32 },
    InsufficientTotalSpent { required: i64, actual: i64 },
    NotNewUser { max_age_days: i64 },
    TierMismatch { required: String },
    LivestreamOnly,
    UnrecognizedCondition { rule: String },
    PerUserLimitReached { limit: u32 },
}

impl IneligibleReason {
    /// Stable machine-readable code, e.g. `below_minimum_order`.
    pub fn code(&self) -> &'static str {
        self.into()
    }
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "coupon is inactive"),
            Self::NotStarted => write!(f, "coupon is not yet valid"),
            Self::Expired => write!(f, "coupon has expired"),
            Self::NotApplicableToCart { .. } => {
                write!(f, "coupon is not applicable to items in cart")
            }
            Self::BelowMinimumOrder { minimum, shortfall } => write!(
                f,
                "order must be at least {} VND; add {} VND more to use this coupon",
                minimum, shortfall
            ),
            Self::NotFollowingSeller { .. } => {
                write!(f, "coupon requires following the shop")
            }
            Self::FollowDurationTooShort {
                required_days,
                actual_days,
            } => write!(
                f,
                "coupon requires following the shop for {} days (currently {})",
                required_days, actual_days
            ),
            Self::InsufficientCompletedOrders { required, actual } => write!(
                f,
                "coupon requires {} completed orders (you have {})",
                required, actual
            ),
            Self::InsufficientTotalSpent { required, actual } => write!(
                f,
                "coupon requires total spending of {} VND (you have spent {} VND)",
                required, actual
            ),
            Self::NotNewUser { max_age_days } => write!(
                f,
                "coupon is only for accounts younger than {} days",
                max_age_days
            ),
            Self::TierMismatch { required } => {
                write!(f, "coupon is only for {} members", required)
            }
            Self::LivestreamOnly => write!(f, "coupon can only be used during a livestream"),
            Self::UnrecognizedCondition { rule } => {
                write!(f, "coupon has an unsupported condition '{}'", rule)
            }
            Self::PerUserLimitReached { limit } => write!(
                f,
                "you have already used this coupon the maximum of {} time(s)",
                limit
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Eligibility {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<IneligibleReason>,
}

impl Eligibility {
    pub fn eligible() -> Self {
        Self {
            eligible: true,
            reason: None,
        }
    }

    pub fn rejected(reason: IneligibleReason) -> Self {
        Self {
            eligible: false,
            reason: Some(reason),
        }
    }

    pub fn message(&self) -> Option<String> {
        self.reason.as_ref().map(ToString::to_string)
    }
}

impl From<Result<(), IneligibleReason>> for Eligibility {
    fn from(outcome: Result<(), IneligibleReason>) -> Self {
        match outcome {
            Ok(()) => Self::eligible(),
            Err(reason) => Self::rejected(reason),
        }
    }
}

/// Stateless; safe to share across request handlers.
#[derive(Clone, Copy, Debug, Default)]
pub struct EligibilityChecker {
    policy: EligibilityPolicy,
}

impl EligibilityChecker {
    pub fn new(policy: EligibilityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    pub fn check(
        &self,
        customer: &CustomerProfile,
        cart: &Cart,
        coupon: &Coupon,
        history: &UsageHistory,
        context: &CheckoutContext,
    ) -> Eligibility {
        let outcome = self.evaluate(customer, cart, coupon, history, context);
        if let Err(reason) = &outcome {
            debug!(
                coupon = %coupon.code,
                customer = %customer.id,
                reason = reason.code(),
                "coupon rejected"
            );
        }
        outcome.into()
    }

    fn evaluate(
        &self,
        customer: &CustomerProfile,
        cart: &Cart,
        coupon: &Coupon,
        history: &UsageHistory,
        context: &CheckoutContext,
    ) -> Result<(), IneligibleReason> {
        if !coupon.is_active {
            return Err(IneligibleReason::Inactive);
        }
        if context.now < coupon.start_at {
            return Err(IneligibleReason::NotStarted);
        }
        if context.now > coupon.end_at {
            return Err(IneligibleReason::Expired);
        }

        if let Some(seller_id) = coupon.seller_id() {
            if !cart.has_items_from(seller_id) {
                return Err(IneligibleReason::NotApplicableToCart { seller_id });
            }
        }

        if let Some(minimum) = coupon.discount.min_order_value {
            if cart.order_value < minimum {
                return Err(IneligibleReason::BelowMinimumOrder {
                    minimum,
                    shortfall: minimum - cart.order_value,
                });
            }
        }

        for condition in &coupon.conditions {
            self.check_condition(condition, customer, coupon, context)?;
        }

        if let Some(limit) = coupon.limits.per_user_limit {
            if history.used_count >= limit {
                return Err(IneligibleReason::PerUserLimitReached { limit });
            }
        }

        Ok(())
    }

    fn check_condition(
        &self,
        condition: &CouponCondition,
        customer: &CustomerProfile,
        coupon: &Coupon,
        context: &CheckoutContext,
    ) -> Result<(), IneligibleReason> {
        match condition {
            CouponCondition::FollowSeller { seller_id } => {
                let target = seller_id.or_else(|| coupon.seller_id());
                match target {
                    Some(id) if customer.followed_since(id).is_some() => Ok(()),
                    _ => Err(IneligibleReason::NotFollowingSeller { seller_id: target }),
                }
            }
            CouponCondition::MinCompletedOrders(required) => {
                if customer.completed_orders >= *required {
                    Ok(())
                } else {
                    Err(IneligibleReason::InsufficientCompletedOrders {
                        required: *required,
                        actual: customer.completed_orders,
                    })
                }
            }
            CouponCondition::FollowDurationDays(required) => {
                let target = coupon.seller_id();
                let since = target
                    .and_then(|id| customer.followed_since(id))
                    .ok_or(IneligibleReason::NotFollowingSeller { seller_id: target })?;
                let actual_days = (context.now - since).num_days();
                if actual_days >= i64::from(*required) {
                    Ok(())
                } else {
                    Err(IneligibleReason::FollowDurationTooShort {
                        required_days: *required,
                        actual_days,
                    })
                }
            }
            CouponCondition::MinTotalSpent(required) => {
                if customer.total_spent >= *required {
                    Ok(())
                } else {
                    Err(IneligibleReason::InsufficientTotalSpent {
                        required: *required,
                        actual: customer.total_spent,
                    })
                }
            }
            CouponCondition::NewUserOnly(false) | CouponCondition::LivestreamOnly(false) => Ok(()),
            CouponCondition::NewUserOnly(true) => {
                if customer.account_age(context.now) < self.policy.new_user_max_age {
                    Ok(())
                } else {
                    Err(IneligibleReason::NotNewUser {
                        max_age_days: self.policy.new_user_max_age.num_days(),
                    })
                }
            }
            CouponCondition::Level(required) => {
                let matches = customer
                    .tier
                    .as_deref()
                    .map_or(false, |tier| tier.trim().eq_ignore_ascii_case(required));
                if matches {
                    Ok(())
                } else {
                    Err(IneligibleReason::TierMismatch {
                        required: required.clone(),
                    })
                }
            }
            CouponCondition::LivestreamOnly(true) => {
                if context.livestream {
                    Ok(())
                } else {
                    Err(IneligibleReason::LivestreamOnly)
                }
            }
            CouponCondition::Unrecognized { rule, .. } => match self.policy.unknown_rules {
                UnknownRulePolicy::Allow => Ok(()),
                UnknownRulePolicy::Deny => {
                    Err(IneligibleReason::UnrecognizedCondition { rule: rule.clone() })
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CartItem, CouponCode, CouponLimits, CouponScope, CouponType, DiscountRule, SellerFollow};
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn coupon() -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            code: CouponCode::parse("NEWYEAR").unwrap(),
            name: "New year".into(),
            description: None,
            coupon_type: CouponType::Voucher,
            discount: DiscountRule::fixed(20_000),
            scope: None,
            conditions: vec![],
            limits: CouponLimits::default(),
            usage_count: 0,
            start_at: now() - Duration::days(10),
            end_at: now() + Duration::days(10),
            is_active: true,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn customer() -> CustomerProfile {
        CustomerProfile::new(Uuid::new_v4(), now() - Duration::days(400))
    }

    fn cart(order_value: i64) -> Cart {
        Cart::new(order_value, vec![])
    }

    fn check(coupon: &Coupon, customer: &CustomerProfile, cart: &Cart) -> Eligibility {
        EligibilityChecker::default().check(
            customer,
            cart,
            coupon,
            &UsageHistory::default(),
            &CheckoutContext::at(now()),
        )
    }

    #[test]
    fn plain_coupon_is_eligible() {
        assert_eq!(check(&coupon(), &customer(), &cart(100_000)), Eligibility::eligible());
    }

    #[test]
    fn inactive_wins_over_everything_else() {
        let mut c = coupon();
        c.is_active = false;
        c.end_at = now() - Duration::days(1);
        let result = check(&c, &customer(), &cart(0));
        assert_eq!(result.reason, Some(IneligibleReason::Inactive));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let mut c = coupon();
        c.start_at = now();
        c.end_at = now();
        assert!(check(&c, &customer(), &cart(1)).eligible);
    }

    #[test]
    fn future_coupon_is_not_started() {
        let mut c = coupon();
        c.start_at = now() + Duration::seconds(1);
        assert_eq!(
            check(&c, &customer(), &cart(1)).reason,
            Some(IneligibleReason::NotStarted)
        );
    }

    #[test]
    fn seller_scope_needs_matching_item() {
        let seller = Uuid::new_v4();
        let mut c = coupon();
        c.scope = Some(CouponScope { seller_id: seller });

        let other = Cart::new(
            50_000,
            vec![CartItem {
                seller_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                quantity: 1,
                price: 50_000,
            }],
        );
        assert_eq!(
            check(&c, &customer(), &other).reason,
            Some(IneligibleReason::NotApplicableToCart { seller_id: seller })
        );

        let mut matching = other.clone();
        matching.items[0].seller_id = seller;
        assert!(check(&c, &customer(), &matching).eligible);
    }

    #[test]
    fn minimum_order_reports_shortfall() {
        let mut c = coupon();
        c.discount = c.discount.with_min_order_value(200_000);
        let result = check(&c, &customer(), &cart(150_000));
        assert_eq!(
            result.reason,
            Some(IneligibleReason::BelowMinimumOrder {
                minimum: 200_000,
                shortfall: 50_000
            })
        );
        assert!(result.message().unwrap().contains("50000"));
    }

    #[test]
    fn conditions_short_circuit_in_order() {
        let mut c = coupon();
        c.conditions = vec![
            CouponCondition::MinCompletedOrders(5),
            CouponCondition::MinTotalSpent(1_000_000),
        ];
        let result = check(&c, &customer(), &cart(10));
        assert_matches!(
            result.reason,
            Some(IneligibleReason::InsufficientCompletedOrders { required: 5, actual: 0 })
        );
    }

    #[test]
    fn follow_rules_use_scope_seller() {
        let seller = Uuid::new_v4();
        let mut c = coupon();
        c.scope = Some(CouponScope { seller_id: seller });
        c.conditions = vec![
            CouponCondition::FollowSeller { seller_id: None },
            CouponCondition::FollowDurationDays(7),
        ];
        let cart = Cart::new(
            10_000,
            vec![CartItem {
                seller_id: seller,
                product_id: Uuid::new_v4(),
                quantity: 1,
                price: 10_000,
            }],
        );

        let mut fan = customer();
        assert_matches!(
            check(&c, &fan, &cart).reason,
            Some(IneligibleReason::NotFollowingSeller { .. })
        );

        fan.follows.push(SellerFollow {
            seller_id: seller,
            since: now() - Duration::days(3),
        });
        assert_matches!(
            check(&c, &fan, &cart).reason,
            Some(IneligibleReason::FollowDurationTooShort { required_days: 7, actual_days: 3 })
        );

        fan.follows[0].since = now() - Duration::days(7);
        assert!(check(&c, &fan, &cart).eligible);
    }

    #[test]
    fn new_user_only_uses_policy_threshold() {
        let mut c = coupon();
        c.conditions = vec![CouponCondition::NewUserOnly(true)];

        let fresh = CustomerProfile::new(Uuid::new_v4(), now() - Duration::days(2));
        assert!(check(&c, &fresh, &cart(1)).eligible);
        assert_matches!(
            check(&c, &customer(), &cart(1)).reason,
            Some(IneligibleReason::NotNewUser { max_age_days: 30 })
        );
    }

    #[test]
    fn level_matches_tier_case_insensitively() {
        let mut c = coupon();
        c.conditions = vec![CouponCondition::Level("Gold".into())];
        let mut member = customer();
        assert!(!check(&c, &member, &cart(1)).eligible);
        member.tier = Some("gold".into());
        assert!(check(&c, &member, &cart(1)).eligible);
    }

    #[test]
    fn livestream_only_reads_checkout_context() {
        let mut c = coupon();
        c.conditions = vec![CouponCondition::LivestreamOnly(true)];
        let checker = EligibilityChecker::default();
        let history = UsageHistory::default();

        let off = checker.check(&customer(), &cart(1), &c, &history, &CheckoutContext::at(now()));
        assert_eq!(off.reason, Some(IneligibleReason::LivestreamOnly));

        let on = checker.check(
            &customer(),
            &cart(1),
            &c,
            &history,
            &CheckoutContext::at(now()).with_livestream(true),
        );
        assert!(on.eligible);
    }

    #[test]
    fn unknown_rules_follow_policy() {
        let mut c = coupon();
        c.conditions = vec![CouponCondition::Unrecognized {
            rule: "birthday_month".into(),
            value: json!(5),
        }];

        assert_matches!(
            check(&c, &customer(), &cart(1)).reason,
            Some(IneligibleReason::UnrecognizedCondition { ref rule }) if rule == "birthday_month"
        );

        let permissive = EligibilityChecker::new(EligibilityPolicy {
            unknown_rules: UnknownRulePolicy::Allow,
            ..EligibilityPolicy::default()
        });
        let result = permissive.check(
            &customer(),
            &cart(1),
            &c,
            &UsageHistory::default(),
            &CheckoutContext::at(now()),
        );
        assert!(result.eligible);
    }

    #[test]
    fn per_user_limit_is_checked_last() {
        let mut c = coupon();
        c.limits.per_user_limit = Some(1);
        let checker = EligibilityChecker::default();

        let first = checker.check(&customer(), &cart(1), &c, &UsageHistory::new(0), &CheckoutContext::at(now()));
        assert!(first.eligible);

        let second = checker.check(&customer(), &cart(1), &c, &UsageHistory::new(1), &CheckoutContext::at(now()));
        assert_eq!(second.reason, Some(IneligibleReason::PerUserLimitReached { limit: 1 }));
    }

    #[test]
    fn reason_codes_are_snake_case() {
        assert_eq!(IneligibleReason::Expired.code(), "expired");
        assert_eq!(
            IneligibleReason::BelowMinimumOrder { minimum: 1, shortfall: 1 }.code(),
            "below_minimum_order"
        );
    }
}
