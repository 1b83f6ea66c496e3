use actix_web::{web, HttpResponse};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::{FindOptions, UpdateOptions};
use mongodb::Collection;
use serde_json::json;

use crate::error::{is_duplicate_key, AppError};
use crate::json::to_json;
use crate::middleware::{AdminUser, AuthUser};
use crate::models::{parse_object_id, NewReview, Product, Review};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reviews")
            .route("/post-review", web::post().to(post_review))
            .route("/total-reviews", web::get().to(total_reviews))
            .route("/{user_id}", web::get().to(reviews_by_user))
            .route("/{id}", web::delete().to(delete_review)),
    );
}

async fn post_review(
    reviews: web::Data<Collection<Review>>,
    products: web::Data<Collection<Product>>,
    caller: AuthUser,
    data: web::Json<NewReview>,
) -> Result<HttpResponse, AppError> {
    let data = data.into_inner();
    data.validate()?;
    let user_id = parse_object_id(&data.user_id, "user")?;
    let product_id = parse_object_id(&data.product_id, "product")?;
    caller.ensure_owner_or_admin(&user_id.to_hex())?;

    if products
        .count_documents(doc! { "_id": product_id }, None)
        .await?
        == 0
    {
        return Err(AppError::not_found("Product not found"));
    }

    let existing = doc! { "userId": user_id, "productId": product_id };
    let update = review_upsert(data.comment.trim(), data.rating, DateTime::now());
    let upsert = UpdateOptions::builder().upsert(true).build();
    match reviews
        .update_one(existing.clone(), update.clone(), upsert)
        .await
    {
        Ok(_) => {}
        // a concurrent post inserted the review first; update it instead
        Err(e) if is_duplicate_key(&e) => {
            reviews.update_one(existing, update, None).await?;
        }
        Err(e) => return Err(e.into()),
    }

    refresh_product_rating(&reviews, &products, product_id).await?;

    let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();
    let product_reviews: Vec<Review> = reviews
        .find(doc! { "productId": product_id }, options)
        .await?
        .try_collect()
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Review processed successfully",
        "reviews": to_json(&product_reviews)?,
    })))
}

async fn total_reviews(reviews: web::Data<Collection<Review>>) -> Result<HttpResponse, AppError> {
    let total = reviews.count_documents(None, None).await?;
    Ok(HttpResponse::Ok().json(json!({ "totalReviews": total })))
}

async fn reviews_by_user(
    reviews: web::Data<Collection<Review>>,
    user_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user_id = parse_object_id(&user_id, "user")?;
    let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();
    let items: Vec<Review> = reviews
        .find(doc! { "userId": user_id }, options)
        .await?
        .try_collect()
        .await?;

    if items.is_empty() {
        return Err(AppError::not_found("No reviews found"));
    }
    Ok(HttpResponse::Ok().json(to_json(&items)?))
}

async fn delete_review(
    reviews: web::Data<Collection<Review>>,
    products: web::Data<Collection<Product>>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "review")?;
    let review = reviews
        .find_one_and_delete(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| AppError::not_found("Review not found"))?;

    refresh_product_rating(&reviews, &products, review.product_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Review deleted successfully" })))
}

/// One review per user and product: re-posting overwrites comment and rating.
fn review_upsert(comment: &str, rating: i32, now: DateTime) -> Document {
    doc! {
        "$set": { "comment": comment, "rating": rating, "updatedAt": now },
        "$setOnInsert": { "_id": ObjectId::new(), "createdAt": now },
    }
}

/// Recomputes the product's average rating from its reviews; 0 when none remain.
async fn refresh_product_rating(
    reviews: &Collection<Review>,
    products: &Collection<Product>,
    product_id: ObjectId,
) -> Result<(), AppError> {
    let pipeline = vec![
        doc! { "$match": { "productId": product_id } },
        doc! { "$group": { "_id": null, "average": { "$avg": "$rating" } } },
    ];
    let summary: Option<Document> = reviews.aggregate(pipeline, None).await?.try_next().await?;
    let average = summary
        .and_then(|d| d.get_f64("average").ok())
        .map(|avg| (avg * 10.0).round() / 10.0)
        .unwrap_or(0.0);

    products
        .update_one(
            doc! { "_id": product_id },
            doc! { "$set": { "rating": average } },
            None,
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_app, user_cookie};
    use actix_web::http::StatusCode;
    use actix_web::test as atest;

    #[test]
    fn reposting_only_sets_identity_on_insert() {
        let now = DateTime::now();
        let update = review_upsert("Lovely", 4, now);

        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("comment").unwrap(), "Lovely");
        assert_eq!(set.get_i32("rating").unwrap(), 4);
        assert!(!set.contains_key("_id"));

        let on_insert = update.get_document("$setOnInsert").unwrap();
        assert!(on_insert.get_object_id("_id").is_ok());
        assert_eq!(on_insert.get_datetime("createdAt").unwrap(), &now);
    }

    #[actix_web::test]
    async fn posting_needs_a_session() {
        let app = atest::init_service(test_app().await).await;
        let req = atest::TestRequest::post()
            .uri("/api/reviews/post-review")
            .set_json(json!({ "comment": "Nice", "rating": 4, "userId": "a", "productId": "b" }))
            .to_request();
        assert_eq!(atest::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn out_of_range_rating_is_rejected() {
        let app = atest::init_service(test_app().await).await;
        let me = ObjectId::new().to_hex();
        let req = atest::TestRequest::post()
            .uri("/api/reviews/post-review")
            .cookie(user_cookie(&me))
            .set_json(json!({
                "comment": "Nice",
                "rating": 9,
                "userId": me,
                "productId": ObjectId::new().to_hex(),
            }))
            .to_request();
        assert_eq!(atest::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn cannot_review_as_someone_else() {
        let app = atest::init_service(test_app().await).await;
        let req = atest::TestRequest::post()
            .uri("/api/reviews/post-review")
            .cookie(user_cookie(&ObjectId::new().to_hex()))
            .set_json(json!({
                "comment": "Nice",
                "rating": 4,
                "userId": ObjectId::new().to_hex(),
                "productId": ObjectId::new().to_hex(),
            }))
            .to_request();
        assert_eq!(atest::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
    }
}
