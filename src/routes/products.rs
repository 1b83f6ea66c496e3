use actix_web::{web, HttpResponse};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::Collection;
use serde::Deserialize;
use serde_json::json;

use super::{populate_user, resolve_author};
use crate::error::AppError;
use crate::json::{bson_to_json, documents_to_json, to_json};
use crate::listing::{by_id, related_filter, search_filter, trending_filter, ProductQuery};
use crate::middleware::AdminUser;
use crate::models::{parse_object_id, set_update, NewProduct, Product, ProductPatch, Review, User};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/product")
            .route("", web::get().to(list_products))
            .route("/", web::get().to(list_products))
            .route("/create-product", web::post().to(create_product))
            .route("/search", web::get().to(search_products))
            .route("/trending", web::get().to(trending_products))
            .route("/related/{id}", web::get().to(related_products))
            .route("/update-product/{id}", web::patch().to(update_product))
            .route("/{id}", web::get().to(get_product))
            .route("/{id}", web::delete().to(delete_product)),
    );
}

async fn create_product(
    products: web::Data<Collection<Product>>,
    users: web::Data<Collection<User>>,
    _admin: AdminUser,
    data: web::Json<NewProduct>,
) -> Result<HttpResponse, AppError> {
    let data = data.into_inner();
    data.validate()?;
    let author = resolve_author(&users, &data.author).await?;

    let product = data.into_product(author);
    products.insert_one(&product, None).await?;
    log::info!("Created product {} ({})", product.id, product.name);

    Ok(HttpResponse::Created().json(to_json(&product)?))
}

async fn list_products(
    products: web::Data<Collection<Product>>,
    query: web::Query<ProductQuery>,
) -> Result<HttpResponse, AppError> {
    let listing = query.into_inner().into_listing()?;
    let options = FindOptions::builder()
        .sort(listing.sort.clone())
        .skip(listing.skip())
        .limit(listing.limit as i64)
        .allow_disk_use(true)
        .build();

    let page = async {
        let cursor = products.find(listing.filter.clone(), options).await?;
        cursor.try_collect::<Vec<Product>>().await
    };
    let total = products.count_documents(listing.filter.clone(), None);
    let (items, total_products) = futures::try_join!(page, total)?;

    Ok(HttpResponse::Ok().json(json!({
        "products": to_json(&items)?,
        "totalProducts": total_products,
        "totalPages": listing.total_pages(total_products),
        "currentPage": listing.page,
    })))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    query: Option<String>,
}

async fn search_products(
    products: web::Data<Collection<Product>>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, AppError> {
    let filter = search_filter(query.query.as_deref().unwrap_or_default())?;
    let items: Vec<Product> = products.find(filter, None).await?.try_collect().await?;
    Ok(HttpResponse::Ok().json(to_json(&items)?))
}

async fn trending_products(
    products: web::Data<Collection<Product>>,
) -> Result<HttpResponse, AppError> {
    let options = FindOptions::builder()
        .sort(doc! { "createdAt": -1 })
        .allow_disk_use(true)
        .build();
    let items: Vec<Product> = products
        .find(trending_filter(), options)
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(to_json(&items)?))
}

async fn get_product(
    products: web::Data<Collection<Product>>,
    reviews: web::Data<Collection<Review>>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "product")?;

    let mut pipeline = vec![doc! { "$match": by_id(id) }];
    pipeline.extend(populate_user("author"));
    let product = products
        .aggregate(pipeline, None)
        .await?
        .try_next()
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    let mut review_pipeline = vec![
        doc! { "$match": { "productId": id } },
        doc! { "$sort": { "createdAt": -1 } },
    ];
    review_pipeline.extend(populate_user("userId"));
    let product_reviews: Vec<Document> = reviews
        .aggregate(review_pipeline, None)
        .await?
        .try_collect()
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "product": bson_to_json(product.into()),
        "reviews": documents_to_json(product_reviews),
    })))
}

async fn update_product(
    products: web::Data<Collection<Product>>,
    _admin: AdminUser,
    id: web::Path<String>,
    patch: web::Json<ProductPatch>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "product")?;
    patch.validate()?;

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();
    let product = products
        .find_one_and_update(by_id(id), set_update(&patch.into_inner())?, options)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Product updated successfully",
        "product": to_json(&product)?,
    })))
}

async fn delete_product(
    products: web::Data<Collection<Product>>,
    reviews: web::Data<Collection<Review>>,
    _admin: AdminUser,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "product")?;

    let deleted = products.delete_one(by_id(id), None).await?;
    if deleted.deleted_count == 0 {
        return Err(AppError::not_found("Product not found"));
    }
    let removed = reviews.delete_many(doc! { "productId": id }, None).await?;
    log::info!(
        "Deleted product {id} and {} associated reviews",
        removed.deleted_count
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Product and associated reviews deleted successfully"
    })))
}

async fn related_products(
    products: web::Data<Collection<Product>>,
    id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_object_id(&id, "product")?;
    let product = products
        .find_one(by_id(id), None)
        .await?
        .ok_or_else(|| AppError::not_found("Product not found"))?;

    let items: Vec<Product> = products
        .find(related_filter(&product), None)
        .await?
        .try_collect()
        .await?;
    Ok(HttpResponse::Ok().json(to_json(&items)?))
}
