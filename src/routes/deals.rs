use actix_web::{web, HttpResponse};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, DateTime};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use serde_json::json;

use crate::error::AppError;
use crate::json::to_json;
use crate::middleware::AdminUser;
use crate::models::{parse_object_id, set_update, to_bson_datetime, Deal, DealPatch, NewDeal};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/deal")
            .route("", web::get().to(list_deals))
            .route("/", web::get().to(list_deals))
            .route("/active", web::get().to(active_deals))
            .route("/create-deal", web::post().to(create_deal))
            .route("/update-deal/{id}", web::patch().to(update_deal))
            .route("/{id}", web::get().to(get_deal))
            .route("/{id}", web::delete().to(delete_deal)),
    );
}

fn newest_first() -> FindOptions {
    FindOptions::builder().sort(doc! { "createdAt": -1 }).build()
}

async fn create_deal(
    deals: web::Data<Collection<Deal>>,
    _admin: AdminUser,
    data: web::Json<NewDeal>,
) -> Result<HttpResponse, AppError> {
    let data = data.into_inner();
    data.validate()?;
    let deal = data.into_deal();
    deals.insert_one(&deal, None).await?;
    Ok(HttpResponse::Created().json(to_json(&deal)?))
}

async fn list_deals(deals: web::Data<Collection<Deal>>) -> Result<HttpResponse, AppError> {
    let items: Vec<Deal> = deals.find(None, newest_first()).await?.try_collect().await?;
    Ok(HttpResponse::Ok().json(to_json(&items)?))
}

/// Deals switched on whose window contains the current instant.
async fn active_deals(deals: web::Data<Collection<Deal>>) -> Result<HttpResponse, AppError> {
    let now = DateTime::now();
    let filter = doc! {
        "isActive": true,
        "startDate": { "$lte": now },
        "endDate": { "$gt": now },
    };
    let items: Vec<Deal> = deals.find(filter, newest_first()).await?.try_collect().await?;
    Ok(HttpResponse::Ok().json(to_json(&items)?))
}

async fn get_deal(
    deals: web::Data<Collection<Deal>>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "deal")?;
    let deal = deals
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| AppError::not_found("Deal not found"))?;
    Ok(HttpResponse::Ok().json(to_json(&deal)?))
}

async fn update_deal(
    deals: web::Data<Collection<Deal>>,
    _admin: AdminUser,
    id: web::Path<String>,
    patch: web::Json<DealPatch>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "deal")?;
    let current = deals
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| AppError::not_found("Deal not found"))?;
    patch.validate_against(&current)?;

    let mut update = set_update(&*patch)?;
    if let Ok(fields) = update.get_document_mut("$set") {
        if let Some(start) = patch.start_date {
            fields.insert("startDate", to_bson_datetime(start));
        }
        if let Some(end) = patch.end_date {
            fields.insert("endDate", to_bson_datetime(end));
        }
    }

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let deal = deals
        .find_one_and_update(doc! { "_id": id }, update, options)
        .await?
        .ok_or_else(|| AppError::not_found("Deal not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Deal updated successfully",
        "deal": to_json(&deal)?,
    })))
}

async fn delete_deal(
    deals: web::Data<Collection<Deal>>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "deal")?;
    let deleted = deals.delete_one(doc! { "_id": id }, None).await?;
    if deleted.deleted_count == 0 {
        return Err(AppError::not_found("Deal not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Deal deleted successfully" })))
}
