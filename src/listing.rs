//! Query building for the product catalog: listing filters, pagination and
//! sorting, text search, and related-product matching.

use mongodb::bson::{doc, oid::ObjectId, Document};
use serde::Deserialize;

use crate::error::AppError;
use crate::models::{Gender, Product};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

const SORTABLE_FIELDS: [&str; 5] = ["createdAt", "updatedAt", "price", "name", "rating"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub gender: Option<String>,
    pub category: Option<String>,
    pub color: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug)]
pub struct ProductListing {
    pub filter: Document,
    pub sort: Document,
    pub page: u64,
    pub limit: u64,
}

impl ProductListing {
    /// Documents before this page. `into_listing` guarantees it fits the driver's i64.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }
}

impl ProductQuery {
    pub fn into_listing(self) -> Result<ProductListing, AppError> {
        let mut filter = Document::new();

        if let Some(gender) = non_blank(self.gender.as_deref()) {
            let gender = Gender::parse(gender)
                .ok_or_else(|| AppError::bad_request("Invalid gender. Use 'male' or 'female'."))?;
            filter.insert("gender", gender.as_str());
        }
        if let Some(category) = non_blank(self.category.as_deref()) {
            filter.insert("category", category);
        }
        if let Some(color) = non_blank(self.color.as_deref()) {
            filter.insert("colors.value", color);
        }

        let mut price = Document::new();
        if let Some(min) = self.min_price {
            price.insert("$gte", min);
        }
        if let Some(max) = self.max_price {
            price.insert("$lte", max);
        }
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(AppError::bad_request("minPrice cannot exceed maxPrice"));
            }
        }
        if !price.is_empty() {
            filter.insert("price", price);
        }

        let sort_by = non_blank(self.sort_by.as_deref()).unwrap_or("createdAt");
        if !SORTABLE_FIELDS.contains(&sort_by) {
            return Err(AppError::bad_request(format!(
                "Cannot sort by '{sort_by}'. Use one of: {}",
                SORTABLE_FIELDS.join(", ")
            )));
        }
        let direction = match non_blank(self.sort_order.as_deref()) {
            Some(order) if order.eq_ignore_ascii_case("asc") => 1,
            _ => -1,
        };
        // _id breaks ties so page boundaries stay stable
        let sort = doc! { sort_by: direction, "_id": direction };

        let page = self.page.unwrap_or(DEFAULT_PAGE).max(1);
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let in_range = (page - 1)
            .checked_mul(limit)
            .is_some_and(|skip| i64::try_from(skip).is_ok());
        if !in_range {
            return Err(AppError::bad_request("Page is out of range"));
        }

        Ok(ProductListing {
            filter,
            sort,
            page,
            limit,
        })
    }
}

/// Case-insensitive substring match on name or description. The query is
/// matched literally, not as a pattern.
pub fn search_filter(query: &str) -> Result<Document, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::bad_request("Search query is required"));
    }
    let pattern = regex::escape(query);
    Ok(doc! {
        "$or": [
            { "name": { "$regex": pattern.as_str(), "$options": "i" } },
            { "description": { "$regex": pattern.as_str(), "$options": "i" } },
        ]
    })
}

/// Words of the product name longer than one character, escaped and joined
/// into an alternation. `None` when the name has no such word.
pub fn name_token_pattern(name: &str) -> Option<String> {
    let words: Vec<String> = name
        .split_whitespace()
        .filter(|word| word.chars().count() > 1)
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join("|"))
    }
}

/// Other products sharing a name word or the category.
pub fn related_filter(product: &Product) -> Document {
    let mut alternatives = vec![doc! { "category": product.category.as_str() }];
    if let Some(pattern) = name_token_pattern(&product.name) {
        alternatives.push(doc! { "name": { "$regex": pattern, "$options": "i" } });
    }
    doc! {
        "_id": { "$ne": product.id },
        "$or": alternatives,
    }
}

pub fn trending_filter() -> Document {
    doc! { "isTrending": true }
}

pub fn by_id(id: ObjectId) -> Document {
    doc! { "_id": id }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
