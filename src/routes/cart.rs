use actix_web::{web, HttpResponse};
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::UpdateOptions;
use mongodb::Collection;
use serde_json::json;

use crate::error::{is_duplicate_key, AppError};
use crate::json::to_json;
use crate::middleware::AuthUser;
use crate::models::{parse_object_id, AddToCartInput, Cart, Product, UpdateCartInput};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cart")
            .route("/add", web::post().to(add_to_cart))
            .route("/update", web::patch().to(update_cart_item))
            .route("/{user_id}/items/{product_id}", web::delete().to(remove_from_cart))
            .route("/{user_id}", web::get().to(get_cart))
            .route("/{user_id}", web::delete().to(clear_cart)),
    );
}

/// Parses the cart owner and checks the caller may touch that cart.
fn owner(caller: &AuthUser, raw: &str) -> Result<ObjectId, AppError> {
    let user_id = parse_object_id(raw, "user")?;
    caller.ensure_owner_or_admin(&user_id.to_hex())?;
    Ok(user_id)
}

async fn load_cart(carts: &Collection<Cart>, user_id: ObjectId) -> Result<Cart, AppError> {
    Ok(carts
        .find_one(doc! { "userId": user_id }, None)
        .await?
        .unwrap_or_else(|| Cart::empty(user_id)))
}

async fn get_cart(
    carts: web::Data<Collection<Cart>>,
    caller: AuthUser,
    user_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user_id = owner(&caller, &user_id)?;
    let cart = load_cart(&carts, user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "cart": to_json(&cart)?,
        "totalItems": cart.total_quantity(),
    })))
}

async fn add_to_cart(
    carts: web::Data<Collection<Cart>>,
    products: web::Data<Collection<Product>>,
    caller: AuthUser,
    data: web::Json<AddToCartInput>,
) -> Result<HttpResponse, AppError> {
    data.validate()?;
    let user_id = owner(&caller, &data.user_id)?;
    let product_id = parse_object_id(&data.product_id, "product")?;

    if products
        .count_documents(doc! { "_id": product_id }, None)
        .await?
        == 0
    {
        return Err(AppError::not_found("Product not found"));
    }

    let now = DateTime::now();
    let bumped = carts
        .update_one(
            doc! { "userId": user_id, "items.productId": product_id },
            doc! {
                "$inc": { "items.$.quantity": data.quantity },
                "$set": { "updatedAt": now },
            },
            None,
        )
        .await?;

    if bumped.matched_count == 0 {
        let push = doc! {
            "$push": { "items": { "productId": product_id, "quantity": data.quantity } },
            "$set": { "updatedAt": now },
            "$setOnInsert": { "_id": ObjectId::new(), "createdAt": now },
        };
        let upsert = UpdateOptions::builder().upsert(true).build();
        match carts
            .update_one(doc! { "userId": user_id }, push.clone(), upsert)
            .await
        {
            Ok(_) => {}
            // another request created the cart first; it exists now
            Err(e) if is_duplicate_key(&e) => {
                carts
                    .update_one(doc! { "userId": user_id }, push, None)
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let cart = load_cart(&carts, user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Product added to cart successfully",
        "cart": to_json(&cart)?,
    })))
}

async fn update_cart_item(
    carts: web::Data<Collection<Cart>>,
    caller: AuthUser,
    data: web::Json<UpdateCartInput>,
) -> Result<HttpResponse, AppError> {
    data.validate()?;
    let user_id = owner(&caller, &data.user_id)?;
    let product_id = parse_object_id(&data.product_id, "product")?;
    let now = DateTime::now();

    let result = if data.quantity == 0 {
        carts
            .update_one(
                doc! { "userId": user_id, "items.productId": product_id },
                doc! {
                    "$pull": { "items": { "productId": product_id } },
                    "$set": { "updatedAt": now },
                },
                None,
            )
            .await?
    } else {
        carts
            .update_one(
                doc! { "userId": user_id, "items.productId": product_id },
                doc! { "$set": { "items.$.quantity": data.quantity, "updatedAt": now } },
                None,
            )
            .await?
    };
    if result.matched_count == 0 {
        return Err(AppError::not_found("Product not found in cart"));
    }

    let cart = load_cart(&carts, user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Cart updated successfully",
        "cart": to_json(&cart)?,
    })))
}

async fn remove_from_cart(
    carts: web::Data<Collection<Cart>>,
    caller: AuthUser,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (user_id, product_id) = path.into_inner();
    let user_id = owner(&caller, &user_id)?;
    let product_id = parse_object_id(&product_id, "product")?;

    let result = carts
        .update_one(
            doc! { "userId": user_id, "items.productId": product_id },
            doc! {
                "$pull": { "items": { "productId": product_id } },
                "$set": { "updatedAt": DateTime::now() },
            },
            None,
        )
        .await?;
    if result.matched_count == 0 {
        return Err(AppError::not_found("Product not found in cart"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Product removed from cart successfully" })))
}

async fn clear_cart(
    carts: web::Data<Collection<Cart>>,
    caller: AuthUser,
    user_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let user_id = owner(&caller, &user_id)?;
    carts
        .update_one(
            doc! { "userId": user_id },
            doc! { "$set": { "items": [], "updatedAt": DateTime::now() } },
            None,
        )
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Cart cleared successfully" })))
}
