use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{Coupon, DiscountKind};

/// Merchandise discount for `order_value`, in whole VND.
///
/// Always within `0..=order_value`; percent discounts are additionally capped
/// by `maxDiscount` and rounded down. Free-shipping coupons take nothing off
/// merchandise, see [`compute_shipping_discount`].
pub fn compute_discount(coupon: &Coupon, order_value: i64) -> i64 {
    let order_value = order_value.max(0);
    let rule = &coupon.discount;

    let raw = match rule.kind {
        DiscountKind::Percent => {
            let amount = Decimal::from(order_value) * rule.value / dec!(100);
            let amount = amount.floor().to_i64().unwrap_or(0);
            match rule.max_discount {
                Some(cap) => amount.min(cap),
                None => amount,
            }
        }
        DiscountKind::Fixed => rule.value.floor().to_i64().unwrap_or(0),
        DiscountKind::FreeShip => 0,
    };

    raw.clamp(0, order_value)
}

/// Shipping fee waived by a free-shipping coupon, capped by `maxDiscount`.
pub fn compute_shipping_discount(coupon: &Coupon, shipping_fee: i64) -> i64 {
    let shipping_fee = shipping_fee.max(0);
    if !provides_free_shipping(coupon) {
        return 0;
    }
    match coupon.discount.max_discount {
        Some(cap) => shipping_fee.min(cap.max(0)),
        None => shipping_fee,
    }
}

pub fn provides_free_shipping(coupon: &Coupon) -> bool {
    matches!(coupon.discount.kind, DiscountKind::FreeShip)
}
