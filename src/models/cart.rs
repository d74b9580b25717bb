use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Largest amount, in VND, accepted for any price, subtotal or fee.
pub const MAX_AMOUNT_VND: i64 = 1_000_000_000_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub seller_id: Uuid,
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: u32,
    #[validate(range(min = 0, max = 1_000_000_000_000))]
    pub price: i64,
}

/// Cart snapshot submitted at checkout. `order_value` is the merchandise
/// subtotal before any discount, in VND.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[validate(range(min = 0, max = 1_000_000_000_000))]
    pub order_value: i64,
    #[serde(default)]
    #[validate]
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn new(order_value: i64, items: Vec<CartItem>) -> Self {
        Self { order_value, items }
    }

    pub fn has_items_from(&self, seller_id: Uuid) -> bool {
        self.items.iter().any(|item| item.seller_id == seller_id)
    }
}
