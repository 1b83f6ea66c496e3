use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::require_text;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub comment: String,
    pub rating: i32,
    pub user_id: ObjectId,
    pub product_id: ObjectId,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub comment: String,
    pub rating: i32,
    pub user_id: String,
    pub product_id: String,
}

impl NewReview {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text(&self.comment, "Comment")?;
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::bad_request("Rating must be between 1 and 5"));
        }
        Ok(())
    }
}
