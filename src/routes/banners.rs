use actix_web::{web, HttpResponse};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Collection;
use serde::Deserialize;
use serde_json::json;

use super::{populate_user, resolve_author};
use crate::error::AppError;
use crate::json::{bson_to_json, documents_to_json, to_json};
use crate::middleware::AdminUser;
use crate::models::{parse_object_id, set_update, Banner, BannerPatch, NewBanner, User};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/banners")
            .route("", web::get().to(list_banners))
            .route("/", web::get().to(list_banners))
            .route("/create-banner", web::post().to(create_banner))
            .route("/update-banner/{id}", web::patch().to(update_banner))
            .route("/{id}", web::get().to(get_banner))
            .route("/{id}", web::delete().to(delete_banner)),
    );
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActiveFilter {
    /// Only `true` (any case) selects active entries; other values select inactive ones.
    pub is_active: Option<String>,
}

impl ActiveFilter {
    /// Pipeline for marketing listings: optional active filter, display order, author.
    pub(crate) fn pipeline(&self) -> Vec<Document> {
        let mut pipeline = Vec::new();
        let active = self
            .is_active
            .as_deref()
            .map(|value| value.trim().eq_ignore_ascii_case("true"));
        if let Some(active) = active {
            pipeline.push(doc! { "$match": { "isActive": active } });
        }
        pipeline.push(doc! { "$sort": { "order": 1, "createdAt": -1 } });
        pipeline.extend(populate_user("author"));
        pipeline
    }
}

async fn create_banner(
    banners: web::Data<Collection<Banner>>,
    users: web::Data<Collection<User>>,
    _admin: AdminUser,
    data: web::Json<NewBanner>,
) -> Result<HttpResponse, AppError> {
    let data = data.into_inner();
    data.validate()?;
    let author = resolve_author(&users, &data.author).await?;

    let banner = data.into_banner(author);
    banners.insert_one(&banner, None).await?;
    Ok(HttpResponse::Created().json(to_json(&banner)?))
}

async fn list_banners(
    banners: web::Data<Collection<Banner>>,
    query: web::Query<ActiveFilter>,
) -> Result<HttpResponse, AppError> {
    let docs: Vec<Document> = banners
        .aggregate(query.pipeline(), None)
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(documents_to_json(docs)))
}

async fn get_banner(
    banners: web::Data<Collection<Banner>>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "banner")?;
    let mut pipeline = vec![doc! { "$match": { "_id": id } }];
    pipeline.extend(populate_user("author"));

    let banner = banners
        .aggregate(pipeline, None)
        .await?
        .try_next()
        .await?
        .ok_or_else(|| AppError::not_found("Banner not found"))?;
    Ok(HttpResponse::Ok().json(bson_to_json(banner.into())))
}

async fn update_banner(
    banners: web::Data<Collection<Banner>>,
    _admin: AdminUser,
    id: web::Path<String>,
    patch: web::Json<BannerPatch>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "banner")?;
    patch.validate()?;
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let banner = banners
        .find_one_and_update(doc! { "_id": id }, set_update(&patch.into_inner())?, options)
        .await?
        .ok_or_else(|| AppError::not_found("Banner not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Banner updated successfully",
        "banner": to_json(&banner)?,
    })))
}

async fn delete_banner(
    banners: web::Data<Collection<Banner>>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "banner")?;
    let deleted = banners.delete_one(doc! { "_id": id }, None).await?;
    if deleted.deleted_count == 0 {
        return Err(AppError::not_found("Banner not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Banner deleted successfully" })))
}
