use serde::{Deserialize, Deserializer, Serialize, de};
use utoipa::ToSchema;

use crate::models::{Order, OrderItem};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    /// Product id.
    #[serde(deserialize_with = "int_or_numeric_string")]
    pub id: i32,
    #[serde(deserialize_with = "int_or_numeric_string")]
    pub quantity: i32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

/// Older storefront clients send line numbers as strings (`"3"`).
fn int_or_numeric_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(value) => i32::try_from(value).map_err(de::Error::custom),
        IntOrString::Str(value) => value
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("expected an integer, got {value:?}"))),
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_address: Option<String>,
    /// Older clients send the contact address here instead of `customer_email`.
    pub email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub order_id: i32,
    pub customer_email: String,
    pub customer_address: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub total_quantity: i64,
}

impl OrderWithItems {
    pub fn new(order: Order, items: Vec<OrderItem>) -> Self {
        let total_quantity = items.iter().map(|item| i64::from(item.quantity)).sum();
        Self {
            order,
            items,
            total_quantity,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminOrderList {
    pub orders: Vec<OrderWithItems>,
    pub count: i64,
}
