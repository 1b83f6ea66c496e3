use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::require_text;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ObjectId,
    pub quantity: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<ObjectId>,
    pub email: String,
    pub products: Vec<OrderLine>,
    pub subtotal: f64,
    #[serde(default)]
    pub discount: f64,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub status: OrderStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Order {
    /// Prices each line and totals the order. `discount_percentage` comes from an already
    /// validated coupon.
    pub fn place(
        email: String,
        user_id: Option<ObjectId>,
        products: Vec<OrderLine>,
        coupon: Option<(String, f64)>,
    ) -> Self {
        let subtotal = round_cents(
            products
                .iter()
                .map(|line| line.price * line.quantity as f64)
                .sum(),
        );
        let (coupon_code, discount) = match coupon {
            Some((code, percentage)) => (Some(code), round_cents(subtotal * percentage / 100.0)),
            None => (None, 0.0),
        };
        let now = DateTime::now();
        Order {
            id: ObjectId::new(),
            order_id: Uuid::new_v4().to_string(),
            user_id,
            email,
            products,
            subtotal,
            discount,
            amount: round_cents(subtotal - discount),
            coupon_code,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineInput {
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub email: String,
    pub user_id: Option<String>,
    #[serde(default)]
    pub products: Vec<OrderLineInput>,
    pub coupon_code: Option<String>,
}

impl NewOrder {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text(&self.email, "Email")?;
        if self.products.is_empty() {
            return Err(AppError::bad_request("Order must contain at least one product"));
        }
        if self.products.iter().any(|line| line.quantity < 1) {
            return Err(AppError::bad_request("Quantity must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
