pub mod cart;
pub mod coupon;
pub mod customer;
pub mod redemption;
pub mod user_coupon;

pub use cart::{Cart, CartItem, MAX_AMOUNT_VND};
pub use coupon::{
    Coupon, CouponCode, CouponCondition, CouponLimits, CouponScope, CouponType, DiscountKind,
    DiscountRule, RawCondition, RuleName,
};
pub use customer::{CheckoutContext, CustomerProfile, SellerFollow, UsageHistory};
pub use redemption::Redemption;
pub use user_coupon::{UserCoupon, UserCouponStatus};
