// Coupon engine
pub mod coupons;
