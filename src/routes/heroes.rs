use actix_web::{web, HttpResponse};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use mongodb::Collection;
use serde_json::json;

use super::banners::ActiveFilter;
use super::{populate_user, resolve_author};
use crate::error::AppError;
use crate::json::{bson_to_json, documents_to_json, to_json};
use crate::middleware::AdminUser;
use crate::models::{parse_object_id, set_update, Hero, HeroPatch, NewHero, User};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/heroes")
            .route("", web::get().to(list_heroes))
            .route("/", web::get().to(list_heroes))
            .route("/create-hero", web::post().to(create_hero))
            .route("/update-hero/{id}", web::patch().to(update_hero))
            .route("/{id}", web::get().to(get_hero))
            .route("/{id}", web::delete().to(delete_hero)),
    );
}

async fn create_hero(
    heroes: web::Data<Collection<Hero>>,
    users: web::Data<Collection<User>>,
    _admin: AdminUser,
    data: web::Json<NewHero>,
) -> Result<HttpResponse, AppError> {
    let data = data.into_inner();
    data.validate()?;
    let author = resolve_author(&users, &data.author).await?;

    let hero = data.into_hero(author);
    heroes.insert_one(&hero, None).await?;
    Ok(HttpResponse::Created().json(to_json(&hero)?))
}

async fn list_heroes(
    heroes: web::Data<Collection<Hero>>,
    query: web::Query<ActiveFilter>,
) -> Result<HttpResponse, AppError> {
    let docs: Vec<Document> = heroes
        .aggregate(query.pipeline(), None)
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(documents_to_json(docs)))
}

async fn get_hero(
    heroes: web::Data<Collection<Hero>>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "hero")?;
    let mut pipeline = vec![doc! { "$match": { "_id": id } }];
    pipeline.extend(populate_user("author"));

    let hero = heroes
        .aggregate(pipeline, None)
        .await?
        .try_next()
        .await?
        .ok_or_else(|| AppError::not_found("Hero not found"))?;
    Ok(HttpResponse::Ok().json(bson_to_json(hero.into())))
}

async fn update_hero(
    heroes: web::Data<Collection<Hero>>,
    _admin: AdminUser,
    id: web::Path<String>,
    patch: web::Json<HeroPatch>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "hero")?;
    patch.validate()?;

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let hero = heroes
        .find_one_and_update(doc! { "_id": id }, set_update(&patch.into_inner())?, options)
        .await?
        .ok_or_else(|| AppError::not_found("Hero not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Hero updated successfully",
        "hero": to_json(&hero)?,
    })))
}

async fn delete_hero(
    heroes: web::Data<Collection<Hero>>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "hero")?;
    let deleted = heroes.delete_one(doc! { "_id": id }, None).await?;
    if deleted.deleted_count == 0 {
        return Err(AppError::not_found("Hero not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Hero deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{admin_cookie, test_app};
    use actix_web::http::StatusCode;
    use actix_web::test;
    use mongodb::bson::oid::ObjectId;

    fn images(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://cdn.example.com/hero-{i}.jpg")).collect()
    }

    #[actix_web::test]
    async fn create_rejects_more_than_four_images() {
        let app = test::init_service(test_app().await).await;
        let req = test::TestRequest::post()
            .uri("/api/heroes/create-hero")
            .cookie(admin_cookie())
            .set_json(json!({
                "title": "New collection",
                "images": images(5),
                "author": ObjectId::new().to_hex(),
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Maximum 4 images allowed");
    }

    #[actix_web::test]
    async fn update_rejects_more_than_four_images() {
        let app = test::init_service(test_app().await).await;
        let req = test::TestRequest::patch()
            .uri(&format!("/api/heroes/update-hero/{}", ObjectId::new().to_hex()))
            .cookie(admin_cookie())
            .set_json(json!({ "images": images(7) }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn malformed_author_is_rejected() {
        let app = test::init_service(test_app().await).await;
        let req = test::TestRequest::post()
            .uri("/api/heroes/create-hero")
            .cookie(admin_cookie())
            .set_json(json!({ "title": "Spring", "images": images(2), "author": "nope" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
