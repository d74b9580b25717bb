use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use strum::{Display, EnumString, IntoStaticStr};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;

lazy_static! {
    static ref COUPON_CODE_PATTERN: Regex =
        Regex::new(r"^[A-Z0-9_-]{3,32}$").expect("coupon code pattern compiles");
}

/// Human-readable coupon identifier, stored upper-case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(value_type = String, example = "SUMMER20")]
pub struct CouponCode(String);

impl CouponCode {
    /// Normalizes a raw code (trim + upper-case) and checks its shape.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if !COUPON_CODE_PATTERN.is_match(&normalized) {
            return Err(ServiceError::ValidationError(format!(
                "coupon code '{}' must be 3-32 characters of A-Z, 0-9, '_' or '-'",
                raw.trim()
            )));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CouponCode {
    type Error = ServiceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self {
        code.0
    }
}

/// Marketing category of a coupon. Does not influence the discount math.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    IntoStaticStr,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CouponType {
    Voucher,
    ShopVoucher,
    FreeShip,
    Combo,
    Event,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, ToSchema)]
pub enum DiscountKind {
    #[serde(rename = "percent")]
    #[strum(serialize = "percent")]
    Percent,
    #[serde(rename = "fixed")]
    #[strum(serialize = "fixed")]
    Fixed,
    #[serde(rename = "freeShip")]
    #[strum(serialize = "freeShip")]
    FreeShip,
}

/// How much a coupon takes off and under which order threshold.
///
/// Money amounts are whole VND. `value` is a percentage for `percent`
/// coupons and an amount for `fixed` ones; it is ignored for `freeShip`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscountRule {
    #[serde(rename = "type")]
    pub kind: DiscountKind,
    #[serde(default)]
    #[schema(value_type = f64, example = 20)]
    pub value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_discount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order_value: Option<i64>,
}

impl DiscountRule {
    pub fn percent(value: Decimal) -> Self {
        Self {
            kind: DiscountKind::Percent,
            value,
            max_discount: None,
            min_order_value: None,
        }
    }

    pub fn fixed(amount: i64) -> Self {
        Self {
            kind: DiscountKind::Fixed,
            value: Decimal::from(amount),
            max_discount: None,
            min_order_value: None,
        }
    }

    pub fn free_ship() -> Self {
        Self {
            kind: DiscountKind::FreeShip,
            value: Decimal::ZERO,
            max_discount: None,
            min_order_value: None,
        }
    }

    pub fn with_max_discount(mut self, max_discount: i64) -> Self {
        self.max_discount = Some(max_discount);
        self
    }

    pub fn with_min_order_value(mut self, min_order_value: i64) -> Self {
        self.min_order_value = Some(min_order_value);
        self
    }
}

/// Restricts a coupon to the items of one seller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponScope {
    pub seller_id: Uuid,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_user_limit: Option<u32>,
}

/// Rule names as they appear on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum RuleName {
    FollowSeller,
    MinCompletedOrders,
    FollowDurationDays,
    MinTotalSpent,
    NewUserOnly,
    Level,
    LivestreamOnly,
}

/// Eligibility predicate attached to a coupon.
///
/// Serialized as `{ "rule": ..., "value": ... }`. Rules this build does not
/// know are kept as [`CouponCondition::Unrecognized`] so the checker decides
/// what to do with them instead of silently dropping them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawCondition", into = "RawCondition")]
pub enum CouponCondition {
    /// The customer follows `seller_id`, or the coupon's scope seller when `None`.
    FollowSeller { seller_id: Option<Uuid> },
    MinCompletedOrders(u32),
    FollowDurationDays(u32),
    MinTotalSpent(i64),
    NewUserOnly(bool),
    Level(String),
    LivestreamOnly(bool),
    Unrecognized { rule: String, value: Value },
}

impl CouponCondition {
    pub fn rule_name(&self) -> &str {
        let known = match self {
            Self::FollowSeller { .. } => RuleName::FollowSeller,
            Self::MinCompletedOrders(_) => RuleName::MinCompletedOrders,
            Self::FollowDurationDays(_) => RuleName::FollowDurationDays,
            Self::MinTotalSpent(_) => RuleName::MinTotalSpent,
            Self::NewUserOnly(_) => RuleName::NewUserOnly,
            Self::Level(_) => RuleName::Level,
            Self::LivestreamOnly(_) => RuleName::LivestreamOnly,
            Self::Unrecognized { rule, .. } => return rule,
        };
        <&'static str>::from(known)
    }
}

/// Loose wire shape of a condition.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RawCondition {
    #[schema(example = "min_completed_orders")]
    pub rule: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub value: Value,
}

fn numeric(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(0),
        _ => 0,
    }
}

fn non_negative_u32(value: &Value) -> u32 {
    u32::try_from(numeric(value).max(0)).unwrap_or(u32::MAX)
}

fn flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        // `{ rule: "new_user_only" }` with no value still means the rule is on
        Value::Null => true,
        _ => false,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl From<RawCondition> for CouponCondition {
    fn from(raw: RawCondition) -> Self {
        let Ok(rule) = raw.rule.trim().parse::<RuleName>() else {
            return Self::Unrecognized {
                rule: raw.rule,
                value: raw.value,
            };
        };
        match rule {
            RuleName::FollowSeller => Self::FollowSeller {
                seller_id: raw
                    .value
                    .as_str()
                    .and_then(|s| Uuid::parse_str(s.trim()).ok()),
            },
            RuleName::MinCompletedOrders => Self::MinCompletedOrders(non_negative_u32(&raw.value)),
            RuleName::FollowDurationDays => Self::FollowDurationDays(non_negative_u32(&raw.value)),
            RuleName::MinTotalSpent => Self::MinTotalSpent(numeric(&raw.value).max(0)),
            RuleName::NewUserOnly => Self::NewUserOnly(flag(&raw.value)),
            RuleName::Level => Self::Level(text(&raw.value)),
            RuleName::LivestreamOnly => Self::LivestreamOnly(flag(&raw.value)),
        }
    }
}

impl From<CouponCondition> for RawCondition {
    fn from(condition: CouponCondition) -> Self {
        let rule = condition.rule_name().to_string();
        let value = match condition {
            CouponCondition::FollowSeller { seller_id } => seller_id
                .map(|id| Value::String(id.to_string()))
                .unwrap_or(Value::Bool(true)),
            CouponCondition::MinCompletedOrders(n) | CouponCondition::FollowDurationDays(n) => {
                Value::from(n)
            }
            CouponCondition::MinTotalSpent(amount) => Value::from(amount),
            CouponCondition::NewUserOnly(on) | CouponCondition::LivestreamOnly(on) => {
                Value::Bool(on)
            }
            CouponCondition::Level(tier) => Value::String(tier),
            CouponCondition::Unrecognized { value, .. } => value,
        };
        RawCondition { rule, value }
    }
}

/// A discount definition with eligibility rules and a validity window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: Uuid,
    pub code: CouponCode,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub coupon_type: CouponType,
    pub discount: DiscountRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<CouponScope>,
    #[serde(default)]
    #[schema(value_type = Vec<RawCondition>)]
    pub conditions: Vec<CouponCondition>,
    #[serde(default)]
    pub limits: CouponLimits,
    /// Redemptions recorded so far, maintained by the store.
    #[serde(default)]
    pub usage_count: u32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    /// Inclusive on both ends.
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.start_at <= now && now <= self.end_at
    }

    pub fn seller_id(&self) -> Option<Uuid> {
        self.scope.as_ref().map(|scope| scope.seller_id)
    }

    pub fn is_exhausted(&self) -> bool {
        self.limits
            .usage_limit
            .map_or(false, |limit| self.usage_count >= limit)
    }
}
