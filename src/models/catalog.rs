use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::require_text;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    /// Case-insensitive parse used by the listing filter.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub value: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_price: Option<f64>,
    pub image: String,
    #[serde(default)]
    pub additional_images: Vec<String>,
    #[serde(default)]
    pub colors: Vec<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metal: Option<String>,
    #[serde(default)]
    pub rating: f64,
    pub author: ObjectId,
    #[serde(default)]
    pub is_trending: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub description: String,
    pub price: f64,
    pub old_price: Option<f64>,
    pub image: String,
    #[serde(default)]
    pub additional_images: Vec<String>,
    #[serde(default)]
    pub colors: Vec<Color>,
    pub size: Option<String>,
    pub gender: Option<Gender>,
    pub metal: Option<String>,
    #[serde(default)]
    pub is_trending: bool,
    #[serde(default)]
    pub author: String,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text(&self.name, "Product name")?;
        require_text(&self.category, "Category")?;
        require_text(&self.description, "Description")?;
        require_text(&self.image, "Image")?;
        check_price(self.price)?;
        if let Some(old_price) = self.old_price {
            check_price(old_price)?;
        }
        Ok(())
    }

    pub fn into_product(self, author: ObjectId) -> Product {
        let now = DateTime::now();
        Product {
            id: ObjectId::new(),
            name: self.name.trim().to_string(),
            category: self.category.trim().to_string(),
            description: self.description,
            price: self.price,
            old_price: self.old_price,
            image: self.image,
            additional_images: self.additional_images,
            colors: self.colors,
            size: self.size,
            gender: self.gender,
            metal: self.metal,
            rating: 0.0,
            author,
            is_trending: self.is_trending,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial product update; absent fields keep their stored value.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<Color>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_trending: Option<bool>,
}

impl ProductPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            require_text(name, "Product name")?;
        }
        if let Some(category) = &self.category {
            require_text(category, "Category")?;
        }
        if let Some(description) = &self.description {
            require_text(description, "Description")?;
        }
        if let Some(image) = &self.image {
            require_text(image, "Image")?;
        }
        if let Some(price) = self.price {
            check_price(price)?;
        }
        if let Some(old_price) = self.old_price {
            check_price(old_price)?;
        }
        Ok(())
    }
}

fn check_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::bad_request("Price must be a non-negative number"));
    }
    Ok(())
}
