pub mod common;
pub mod coupons;
