use serde::Serialize;
use utoipa::ToSchema;

use super::discount::{compute_discount, compute_shipping_discount, provides_free_shipping};
use crate::errors::ServiceError;
use crate::models::{Coupon, CouponCode};

/// Order totals after applying a set of coupons.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuote {
    pub subtotal: i64,
    pub merchandise_discount: i64,
    pub shipping_fee: i64,
    pub shipping_discount: i64,
    pub total: i64,
    #[schema(value_type = Vec<String>)]
    pub applied_codes: Vec<CouponCode>,
}

/// Combines coupons into one quote.
///
/// An order takes at most one merchandise coupon (percent or fixed) and at
/// most one free-shipping coupon.
pub fn quote_order(
    order_value: i64,
    shipping_fee: i64,
    coupons: &[&Coupon],
) -> Result<OrderQuote, ServiceError> {
    let subtotal = order_value.max(0);
    let shipping_fee = shipping_fee.max(0);

    let mut merchandise: Option<&Coupon> = None;
    let mut shipping: Option<&Coupon> = None;
    for &coupon in coupons {
        let slot = if provides_free_shipping(coupon) {
            &mut shipping
        } else {
            &mut merchandise
        };
        if let Some(existing) = slot {
            return Err(ServiceError::InvalidOperation(format!(
                "coupons {} and {} cannot be combined",
                existing.code, coupon.code
            )));
        }
        *slot = Some(coupon);
    }

    let merchandise_discount = merchandise.map_or(0, |c| compute_discount(c, subtotal));
    let shipping_discount = shipping.map_or(0, |c| compute_shipping_discount(c, shipping_fee));

    let total = (subtotal - merchandise_discount)
        .checked_add(shipping_fee - shipping_discount)
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "order value {} plus shipping fee {} is out of range",
                subtotal, shipping_fee
            ))
        })?;

    Ok(OrderQuote {
        subtotal,
        merchandise_discount,
        shipping_fee,
        shipping_discount,
        total,
        applied_codes: merchandise
            .into_iter()
            .chain(shipping)
            .map(|c| c.code.clone())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CouponLimits, CouponType, DiscountRule};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn coupon(code: &str, discount: DiscountRule) -> Coupon {
        let now = Utc::now();
        Coupon {
            id: Uuid::new_v4(),
            code: CouponCode::parse(code).unwrap(),
            name: code.into(),
            description: None,
            coupon_type: CouponType::Combo,
            discount,
            scope: None,
            conditions: vec![],
            limits: CouponLimits::default(),
            usage_count: 0,
            start_at: now,
            end_at: now,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn merchandise_and_shipping_coupons_stack() {
        let pct = coupon("PCT10", DiscountRule::percent(dec!(10)));
        let ship = coupon("SHIPFREE", DiscountRule::free_ship());

        let quote = quote_order(300_000, 25_000, &[&pct, &ship]).unwrap();
        assert_eq!(quote.merchandise_discount, 30_000);
        assert_eq!(quote.shipping_discount, 25_000);
        assert_eq!(quote.total, 270_000);
        assert_eq!(quote.applied_codes.len(), 2);
    }

    #[test]
    fn two_merchandise_coupons_are_rejected() {
        let a = coupon("AAA", DiscountRule::fixed(1_000));
        let b = coupon("BBB", DiscountRule::percent(dec!(5)));
        let err = quote_order(100_000, 0, &[&a, &b]).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOperation(_)));
    }

    #[test]
    fn no_coupons_is_plain_total() {
        let quote = quote_order(50_000, 15_000, &[]).unwrap();
        assert_eq!(quote.total, 65_000);
        assert!(quote.applied_codes.is_empty());
    }

    #[test]
    fn out_of_range_total_is_rejected() {
        let err = quote_order(i64::MAX, 1, &[]).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let ship = coupon("SHIPALL", DiscountRule::free_ship());
        let quote = quote_order(i64::MAX, 1, &[&ship]).unwrap();
        assert_eq!(quote.total, i64::MAX);
    }
}
