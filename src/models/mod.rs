use mongodb::bson::{self, doc, oid::ObjectId, DateTime, Document};
use serde::Serialize;

use crate::error::AppError;

mod cart;
mod catalog;
mod marketing;
mod order;
mod promotion;
mod review;
mod user;

pub use cart::{AddToCartInput, Cart, CartItem, UpdateCartInput};
pub use catalog::{Color, Gender, NewProduct, Product, ProductPatch};
pub use marketing::{
    check_hero_images, Banner, BannerPatch, Hero, HeroPatch, NewBanner, NewHero, MAX_HERO_IMAGES,
};
pub use order::{NewOrder, Order, OrderLine, OrderLineInput, OrderStatus, StatusUpdate};
pub(crate) use order::round_cents;
pub use promotion::{
    ApplyCouponInput, Coupon, CouponPatch, Deal, DealPatch, NewCoupon, NewDeal,
};
pub use review::{NewReview, Review};
pub use user::{
    Claims, EditProfileInput, LoginInput, Otp, RegisterInput, Role, RoleUpdate, SendOtpInput, User,
    VerifyOtpInput, OTP_TTL_MINUTES,
};

/// Parses a path or body identifier; `what` names it in the 400 message.
pub fn parse_object_id(raw: &str, what: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::bad_request(format!("Invalid {what} ID")))
}

/// Builds a `$set` update from a patch whose `None` fields are skipped, stamping `updatedAt`.
pub fn set_update<T: Serialize>(patch: &T) -> Result<Document, AppError> {
    let mut fields = bson::to_document(patch)?;
    fields.insert("updatedAt", DateTime::now());
    Ok(doc! { "$set": fields })
}

pub fn to_bson_datetime(at: chrono::DateTime<chrono::Utc>) -> DateTime {
    DateTime::from_millis(at.timestamp_millis())
}

pub(crate) fn require_text(value: &str, field: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(())
}
