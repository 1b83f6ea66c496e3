use actix_web::{web, HttpResponse};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, DateTime};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use serde_json::json;

use crate::error::{is_duplicate_key, AppError};
use crate::json::to_json;
use crate::middleware::AdminUser;
use crate::models::{
    parse_object_id, set_update, to_bson_datetime, ApplyCouponInput, Coupon, CouponPatch,
    NewCoupon,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/coupon")
            .route("", web::get().to(list_coupons))
            .route("/", web::get().to(list_coupons))
            .route("/create-coupon", web::post().to(create_coupon))
            .route("/apply", web::post().to(apply_coupon))
            .route("/update-coupon/{id}", web::patch().to(update_coupon))
            .route("/{id}", web::delete().to(delete_coupon)),
    );
}

async fn create_coupon(
    coupons: web::Data<Collection<Coupon>>,
    _admin: AdminUser,
    data: web::Json<NewCoupon>,
) -> Result<HttpResponse, AppError> {
    let data = data.into_inner();
    data.validate()?;
    let coupon = data.into_coupon();

    match coupons.insert_one(&coupon, None).await {
        Ok(_) => {}
        Err(e) if is_duplicate_key(&e) => {
            return Err(AppError::bad_request("Coupon code already exists"));
        }
        Err(e) => return Err(e.into()),
    }
    log::info!("Coupon {} created", coupon.code);
    Ok(HttpResponse::Created().json(to_json(&coupon)?))
}

async fn list_coupons(
    coupons: web::Data<Collection<Coupon>>,
    _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();
    let items: Vec<Coupon> = coupons.find(None, options).await?.try_collect().await?;
    Ok(HttpResponse::Ok().json(to_json(&items)?))
}

async fn apply_coupon(
    coupons: web::Data<Collection<Coupon>>,
    data: web::Json<ApplyCouponInput>,
) -> Result<HttpResponse, AppError> {
    if data.amount < 0.0 {
        return Err(AppError::bad_request("Amount must not be negative"));
    }
    let code = Coupon::normalize_code(&data.code);
    if code.is_empty() {
        return Err(AppError::bad_request("Coupon code is required"));
    }

    let coupon = coupons
        .find_one(doc! { "code": code.as_str() }, None)
        .await?
        .ok_or_else(|| AppError::not_found("Coupon not found"))?;
    coupon.ensure_usable(DateTime::now())?;

    Ok(HttpResponse::Ok().json(coupon.quote(data.amount)))
}

async fn update_coupon(
    coupons: web::Data<Collection<Coupon>>,
    _admin: AdminUser,
    id: web::Path<String>,
    patch: web::Json<CouponPatch>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "coupon")?;
    patch.validate()?;

    let mut update = set_update(&*patch)?;
    if let Some(expires_at) = patch.expires_at {
        update
            .get_document_mut("$set")
            .map_err(|_| AppError::bad_request("Invalid coupon update"))?
            .insert("expiresAt", to_bson_datetime(expires_at));
    }

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let coupon = coupons
        .find_one_and_update(doc! { "_id": id }, update, options)
        .await?
        .ok_or_else(|| AppError::not_found("Coupon not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Coupon updated successfully",
        "coupon": to_json(&coupon)?,
    })))
}

async fn delete_coupon(
    coupons: web::Data<Collection<Coupon>>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "coupon")?;
    let deleted = coupons.delete_one(doc! { "_id": id }, None).await?;
    if deleted.deleted_count == 0 {
        return Err(AppError::not_found("Coupon not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Coupon deleted successfully" })))
}
