use actix_web::{web, HttpResponse};
use mongodb::bson::{doc, oid::ObjectId, Document};
use mongodb::Collection;
use serde_json::json;

use crate::error::AppError;
use crate::middleware::RateLimit;
use crate::models::{parse_object_id, User};

mod auth;
mod banners;
mod cart;
mod coupons;
mod deals;
mod heroes;
mod orders;
mod products;
mod reviews;
mod stats;
mod upload;

pub fn configure(cfg: &mut web::ServiceConfig, rate_limit: RateLimit) {
    cfg.route("/", web::get().to(health)).service(
        web::scope("/api")
            .wrap(rate_limit)
            .configure(auth::configure)
            .configure(products::configure)
            .configure(reviews::configure)
            .configure(stats::configure)
            .configure(cart::configure)
            .configure(deals::configure)
            .configure(orders::configure)
            .configure(coupons::configure)
            .configure(banners::configure)
            .configure(heroes::configure)
            .configure(upload::configure),
    );
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("Jewelry store API is running")
}

pub async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "message": "Route not found" }))
}

/// Validates an author reference: it must parse and name an existing user.
pub(crate) async fn resolve_author(
    users: &Collection<User>,
    raw: &str,
) -> Result<ObjectId, AppError> {
    let author = parse_object_id(raw, "author")?;
    let exists = users.count_documents(doc! { "_id": author }, None).await? > 0;
    if !exists {
        return Err(AppError::bad_request("Invalid author ID"));
    }
    Ok(author)
}

/// `$lookup` stages replacing `field` (a user id) with `{_id, email, username}`.
pub(crate) fn populate_user(field: &str) -> Vec<Document> {
    vec![
        doc! {
            "$lookup": {
                "from": crate::db::USERS,
                "localField": field,
                "foreignField": "_id",
                "pipeline": [{ "$project": { "email": 1, "username": 1 } }],
                "as": field,
            }
        },
        doc! {
            "$unwind": {
                "path": format!("${field}"),
                "preserveNullAndEmptyArrays": true,
            }
        },
    ]
}
