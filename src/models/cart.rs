use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ObjectId,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    #[serde(default)]
    pub items: Vec<CartItem>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Cart {
    pub fn empty(user_id: ObjectId) -> Self {
        let now = DateTime::now();
        Cart {
            id: ObjectId::new(),
            user_id,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartInput {
    pub user_id: String,
    pub product_id: String,
    #[serde(default = "one")]
    pub quantity: i64,
}

impl AddToCartInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.quantity < 1 {
            return Err(AppError::bad_request("Quantity must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartInput {
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
}

impl UpdateCartInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.quantity < 0 {
            return Err(AppError::bad_request("Quantity cannot be negative"));
        }
        Ok(())
    }
}

fn one() -> i64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_defaults_to_one_item() {
        let input: AddToCartInput =
            serde_json::from_str(r#"{"userId":"u","productId":"p"}"#).unwrap();
        assert_eq!(input.quantity, 1);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn zero_quantity_only_allowed_on_update() {
        let add = AddToCartInput {
            user_id: "u".into(),
            product_id: "p".into(),
            quantity: 0,
        };
        assert!(add.validate().is_err());

        let update = UpdateCartInput {
            user_id: "u".into(),
            product_id: "p".into(),
            quantity: 0,
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn total_quantity_sums_lines() {
        let mut cart = Cart::empty(ObjectId::new());
        cart.items.push(CartItem { product_id: ObjectId::new(), quantity: 2 });
        cart.items.push(CartItem { product_id: ObjectId::new(), quantity: 3 });
        assert_eq!(cart.total_quantity(), 5);
    }
}
