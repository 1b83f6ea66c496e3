use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use serde_json::json;

use crate::error::AppError;
use crate::json::to_json;
use crate::middleware::{AdminUser, AuthUser};
use crate::models::{
    parse_object_id, Coupon, NewOrder, Order, OrderLine, Product, StatusUpdate, User,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(list_orders))
            .route("/", web::get().to(list_orders))
            .route("/create-order", web::post().to(create_order))
            .route("/order/{id}", web::get().to(get_order))
            .route("/update-order-status/{id}", web::patch().to(update_order_status))
            .route("/delete-order/{id}", web::delete().to(delete_order))
            .route("/{email}", web::get().to(orders_by_email)),
    );
}

fn newest_first() -> FindOptions {
    FindOptions::builder().sort(doc! { "createdAt": -1 }).build()
}

async fn create_order(
    orders: web::Data<Collection<Order>>,
    products: web::Data<Collection<Product>>,
    coupons: web::Data<Collection<Coupon>>,
    data: web::Json<NewOrder>,
) -> Result<HttpResponse, AppError> {
    let data = data.into_inner();
    data.validate()?;

    let user_id = match data.user_id.as_deref().filter(|id| !id.trim().is_empty()) {
        Some(raw) => Some(parse_object_id(raw, "user")?),
        None => None,
    };

    let mut wanted = Vec::with_capacity(data.products.len());
    for line in &data.products {
        wanted.push((parse_object_id(&line.product_id, "product")?, line.quantity));
    }
    let ids: Vec<ObjectId> = wanted.iter().map(|(id, _)| *id).collect();

    let prices: HashMap<ObjectId, f64> = products
        .find(doc! { "_id": { "$in": ids } }, None)
        .await?
        .map_ok(|product| (product.id, product.price))
        .try_collect()
        .await?;

    let mut lines = Vec::with_capacity(wanted.len());
    for (product_id, quantity) in wanted {
        let price = *prices
            .get(&product_id)
            .ok_or_else(|| AppError::bad_request(format!("Unknown product {product_id}")))?;
        lines.push(OrderLine {
            product_id,
            quantity,
            price,
        });
    }

    let coupon = match data.coupon_code.as_deref().map(Coupon::normalize_code) {
        Some(code) if !code.is_empty() => {
            let coupon = coupons
                .find_one(doc! { "code": code.as_str() }, None)
                .await?
                .ok_or_else(|| AppError::bad_request("Invalid coupon code"))?;
            coupon.ensure_usable(DateTime::now())?;
            Some((coupon.code, coupon.discount_percentage))
        }
        _ => None,
    };

    let order = Order::place(data.email.trim().to_lowercase(), user_id, lines, coupon);
    orders.insert_one(&order, None).await?;
    log::info!("Order {} placed for {}", order.order_id, order.amount);

    Ok(HttpResponse::Created().json(to_json(&order)?))
}

async fn orders_by_email(
    orders: web::Data<Collection<Order>>,
    users: web::Data<Collection<User>>,
    caller: AuthUser,
    email: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let email = email.trim().to_lowercase();
    if !caller.0.is_admin() && !owns_email(&users, &caller, &email).await? {
        return Err(AppError::Forbidden("Access denied".into()));
    }
    let items: Vec<Order> = orders
        .find(doc! { "email": email.as_str() }, newest_first())
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(to_json(&items)?))
}

/// Whether the caller's account is registered under `email`.
async fn owns_email(
    users: &Collection<User>,
    caller: &AuthUser,
    email: &str,
) -> Result<bool, AppError> {
    let me = parse_object_id(&caller.0.sub, "user")?;
    Ok(users
        .count_documents(doc! { "_id": me, "email": email }, None)
        .await?
        > 0)
}

async fn get_order(
    orders: web::Data<Collection<Order>>,
    users: web::Data<Collection<User>>,
    caller: AuthUser,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "order")?;
    let order = orders
        .find_one(doc! { "_id": id }, None)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    let placed_by_caller = order.user_id.is_some_and(|u| u.to_hex() == caller.0.sub);
    if !caller.0.is_admin()
        && !placed_by_caller
        && !owns_email(&users, &caller, &order.email).await?
    {
        return Err(AppError::Forbidden("Access denied".into()));
    }
    Ok(HttpResponse::Ok().json(to_json(&order)?))
}

async fn list_orders(
    orders: web::Data<Collection<Order>>,
    _admin: AdminUser,
) -> Result<HttpResponse, AppError> {
    let items: Vec<Order> = orders.find(None, newest_first()).await?.try_collect().await?;
    Ok(HttpResponse::Ok().json(to_json(&items)?))
}

async fn update_order_status(
    orders: web::Data<Collection<Order>>,
    _admin: AdminUser,
    id: web::Path<String>,
    data: web::Json<StatusUpdate>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "order")?;
    let status = mongodb::bson::to_bson(&data.status)?;
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    let order = orders
        .find_one_and_update(
            doc! { "_id": id },
            doc! { "$set": { "status": status, "updatedAt": DateTime::now() } },
            options,
        )
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Order status updated successfully",
        "order": to_json(&order)?,
    })))
}

async fn delete_order(
    orders: web::Data<Collection<Order>>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "order")?;
    let deleted = orders.delete_one(doc! { "_id": id }, None).await?;
    if deleted.deleted_count == 0 {
        return Err(AppError::not_found("Order not found"));
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Order deleted successfully" })))
}
