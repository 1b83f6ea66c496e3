use chrono::Utc;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::order::round_cents;
use super::{require_text, to_bson_datetime};
use crate::error::AppError;

fn default_active() -> bool {
    true
}

fn check_percentage(percentage: f64) -> Result<(), AppError> {
    if !(1.0..=100.0).contains(&percentage) {
        return Err(AppError::bad_request(
            "Discount percentage must be between 1 and 100",
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub code: String,
    pub discount_percentage: f64,
    pub expires_at: DateTime,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Coupon {
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    pub fn ensure_usable(&self, now: DateTime) -> Result<(), AppError> {
        if !self.is_active {
            return Err(AppError::bad_request("Coupon is not active"));
        }
        if now >= self.expires_at {
            return Err(AppError::bad_request("Coupon has expired"));
        }
        Ok(())
    }

    pub fn quote(&self, amount: f64) -> Value {
        let discount_amount = round_cents(amount * self.discount_percentage / 100.0);
        json!({
            "code": self.code,
            "discountPercentage": self.discount_percentage,
            "discountAmount": discount_amount,
            "finalAmount": round_cents(amount - discount_amount),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCoupon {
    pub code: String,
    pub discount_percentage: f64,
    pub expires_at: chrono::DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl NewCoupon {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text(&self.code, "Coupon code")?;
        check_percentage(self.discount_percentage)
    }

    pub fn into_coupon(self) -> Coupon {
        let now = DateTime::now();
        Coupon {
            id: ObjectId::new(),
            code: Coupon::normalize_code(&self.code),
            discount_percentage: self.discount_percentage,
            expires_at: to_bson_datetime(self.expires_at),
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Dates are converted by the handler; they are not serialized with the rest of the patch.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<f64>,
    #[serde(skip_serializing)]
    pub expires_at: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl CouponPatch {
    pub fn validate(&self) -> Result<(), AppError> {
        match self.discount_percentage {
            Some(percentage) => check_percentage(percentage),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplyCouponInput {
    pub code: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub discount_percentage: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub start_date: DateTime,
    pub end_date: DateTime,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDeal {
    pub title: String,
    pub description: Option<String>,
    pub discount_percentage: f64,
    pub image_url: Option<String>,
    pub start_date: chrono::DateTime<Utc>,
    pub end_date: chrono::DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl NewDeal {
    pub fn validate(&self) -> Result<(), AppError> {
        require_text(&self.title, "Title")?;
        check_percentage(self.discount_percentage)?;
        check_window(self.start_date, self.end_date)
    }

    pub fn into_deal(self) -> Deal {
        let now = DateTime::now();
        Deal {
            id: ObjectId::new(),
            title: self.title,
            description: self.description,
            discount_percentage: self.discount_percentage,
            image_url: self.image_url,
            start_date: to_bson_datetime(self.start_date),
            end_date: to_bson_datetime(self.end_date),
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing)]
    pub start_date: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub end_date: Option<chrono::DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl DealPatch {
    /// Validates the patch against the stored deal so a one-sided date change
    /// cannot invert the window.
    pub fn validate_against(&self, current: &Deal) -> Result<(), AppError> {
        if let Some(percentage) = self.discount_percentage {
            check_percentage(percentage)?;
        }
        let start = self
            .start_date
            .map(to_bson_datetime)
            .unwrap_or(current.start_date);
        let end = self.end_date.map(to_bson_datetime).unwrap_or(current.end_date);
        if start >= end {
            return Err(AppError::bad_request("Start date must be before end date"));
        }
        Ok(())
    }
}

fn check_window(start: chrono::DateTime<Utc>, end: chrono::DateTime<Utc>) -> Result<(), AppError> {
    if start >= end {
        return Err(AppError::bad_request("Start date must be before end date"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(active: bool, expires_in: Duration) -> Coupon {
        NewCoupon {
            code: " festive10 ".into(),
            discount_percentage: 10.0,
            expires_at: Utc::now() + expires_in,
            is_active: active,
        }
        .into_coupon()
    }

    #[test]
    fn codes_are_upper_cased() {
        assert_eq!(coupon(true, Duration::days(1)).code, "FESTIVE10");
    }

    #[test]
    fn expired_and_inactive_coupons_are_unusable() {
        let now = DateTime::now();
        assert!(coupon(true, Duration::days(1)).ensure_usable(now).is_ok());
        assert!(coupon(false, Duration::days(1)).ensure_usable(now).is_err());
        assert!(coupon(true, Duration::days(-1)).ensure_usable(now).is_err());
    }

    #[test]
    fn quote_rounds_to_cents() {
        let quote = coupon(true, Duration::days(1)).quote(33.33);
        assert_eq!(quote["discountAmount"], 3.33);
        assert_eq!(quote["finalAmount"], 30.0);
    }

    #[test]
    fn percentage_bounds() {
        assert!(check_percentage(0.0).is_err());
        assert!(check_percentage(100.0).is_ok());
        assert!(check_percentage(150.0).is_err());
    }

    #[test]
    fn deal_window_must_be_ordered() {
        let now = Utc::now();
        let deal = NewDeal {
            title: "Weekend".into(),
            description: None,
            discount_percentage: 15.0,
            image_url: None,
            start_date: now,
            end_date: now - Duration::hours(1),
            is_active: true,
        };
        assert!(deal.validate().is_err());
    }

    #[test]
    fn deal_patch_checks_combined_window() {
        let now = Utc::now();
        let deal = NewDeal {
            title: "Weekend".into(),
            description: None,
            discount_percentage: 15.0,
            image_url: None,
            start_date: now,
            end_date: now + Duration::days(2),
            is_active: true,
        }
        .into_deal();

        let patch = DealPatch {
            start_date: Some(now + Duration::days(3)),
            ..Default::default()
        };
        assert!(patch.validate_against(&deal).is_err());

        let patch = DealPatch {
            end_date: Some(now + Duration::days(5)),
            ..Default::default()
        };
        assert!(patch.validate_against(&deal).is_ok());
    }
}
