use actix_web::{web, HttpResponse};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::Collection;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::middleware::{AdminUser, AuthUser};
use crate::models::{round_cents, Order, Product, Review, User};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/stats")
            .route("/user-stats/{email}", web::get().to(user_stats))
            .route("/admin-stats", web::get().to(admin_stats)),
    );
}

/// Orders that count toward payments and earnings.
fn paid_orders() -> Document {
    doc! { "status": { "$ne": "cancelled" } }
}

/// Reads a numeric aggregate result, whatever BSON width the server chose.
fn number(document: &Document, key: &str) -> f64 {
    match document.get(key) {
        Some(Bson::Double(v)) => *v,
        Some(Bson::Int32(v)) => f64::from(*v),
        Some(Bson::Int64(v)) => *v as f64,
        _ => 0.0,
    }
}

async fn sum_amounts(orders: &Collection<Document>, filter: Document) -> Result<f64, AppError> {
    let pipeline = vec![
        doc! { "$match": filter },
        doc! { "$group": { "_id": null, "total": { "$sum": "$amount" } } },
    ];
    let summary = orders.aggregate(pipeline, None).await?.try_next().await?;
    Ok(round_cents(summary.map(|d| number(&d, "total")).unwrap_or(0.0)))
}

async fn user_stats(
    users: web::Data<Collection<User>>,
    orders: web::Data<Collection<Order>>,
    reviews: web::Data<Collection<Review>>,
    caller: AuthUser,
    email: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let email = email.trim().to_lowercase();
    let user = users
        .find_one(doc! { "email": email.as_str() }, None)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    caller.ensure_owner_or_admin(&user.id.to_hex())?;

    let mut paid = paid_orders();
    paid.insert("email", email.as_str());

    let raw_orders = orders.clone_with_type::<Document>();
    let (total_payments, total_reviews, purchased) = futures::try_join!(
        sum_amounts(&raw_orders, paid.clone()),
        async {
            reviews
                .count_documents(doc! { "userId": user.id }, None)
                .await
                .map_err(AppError::from)
        },
        async {
            orders
                .distinct("products.productId", paid.clone(), None)
                .await
                .map_err(AppError::from)
        },
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "totalPayments": total_payments,
        "totalReviews": total_reviews,
        "totalPurchasedProducts": purchased.len(),
    })))
}

async fn admin_stats(
    users: web::Data<Collection<User>>,
    orders: web::Data<Collection<Order>>,
    products: web::Data<Collection<Product>>,
    reviews: web::Data<Collection<Review>>,
    _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    let raw_orders = orders.clone_with_type::<Document>();
    let (total_orders, total_products, total_reviews, total_users, total_earnings, monthly) =
        futures::try_join!(
            async { orders.count_documents(None, None).await.map_err(AppError::from) },
            async { products.count_documents(None, None).await.map_err(AppError::from) },
            async { reviews.count_documents(None, None).await.map_err(AppError::from) },
            async { users.count_documents(None, None).await.map_err(AppError::from) },
            sum_amounts(&raw_orders, paid_orders()),
            monthly_earnings(&raw_orders),
        )?;

    Ok(HttpResponse::Ok().json(json!({
        "totalOrders": total_orders,
        "totalProducts": total_products,
        "totalReviews": total_reviews,
        "totalUsers": total_users,
        "totalEarnings": total_earnings,
        "monthlyEarnings": monthly,
    })))
}

fn monthly_pipeline() -> Vec<Document> {
    vec![
        doc! { "$match": paid_orders() },
        doc! {
            "$group": {
                "_id": { "month": { "$month": "$createdAt" }, "year": { "$year": "$createdAt" } },
                "earnings": { "$sum": "$amount" },
            }
        },
        doc! { "$sort": { "_id.year": 1, "_id.month": 1 } },
    ]
}

async fn monthly_earnings(orders: &Collection<Document>) -> Result<Vec<Value>, AppError> {
    let buckets: Vec<Document> = orders
        .aggregate(monthly_pipeline(), None)
        .await?
        .try_collect()
        .await?;

    Ok(buckets
        .iter()
        .map(|bucket| {
            let period = bucket.get_document("_id").cloned().unwrap_or_default();
            json!({
                "month": number(&period, "month") as i64,
                "year": number(&period, "year") as i64,
                "earnings": round_cents(number(bucket, "earnings")),
            })
        })
        .collect())
}
