//! End-to-end flows against a live MongoDB. Run with
//! `TEST_DB_URL=mongodb://localhost:27017 cargo test -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use actix_web::cookie::Cookie;
use actix_web::http::StatusCode;
use actix_web::test;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::{Client, Database};
use serde_json::{json, Value};

use jewelry_store::config::Config;
use jewelry_store::middleware::RateLimit;
use jewelry_store::models::{Otp, Product, Review, Role, User};
use jewelry_store::services::auth::{hash_password, issue_token, SESSION_COOKIE};
use jewelry_store::services::email::EmailService;
use jewelry_store::services::upload::ImageUploader;
use jewelry_store::{build_app, db, AppState};

const SECRET: &str = "integration-secret";

async fn fresh_database() -> (Config, Database) {
    let url = std::env::var("TEST_DB_URL").unwrap_or_else(|_| "mongodb://localhost:27017".into());
    let config = Config {
        database_url: url.clone(),
        database_name: format!("jewelry_store_it_{}", ObjectId::new().to_hex()),
        port: 0,
        jwt_secret: SECRET.to_string(),
        allowed_origins: vec!["http://localhost:5173".to_string()],
        cookie_secure: false,
        rate_limit_max: 10_000,
        rate_limit_window_secs: 60,
        trust_proxy: false,
        smtp: None,
        cloudinary: None,
    };
    let client = Client::with_uri_str(&url).await.expect("connect");
    let database = client.database(&config.database_name);
    db::ensure_indexes(&database).await.expect("indexes");
    (config, database)
}

fn state(config: Config, database: Database) -> AppState {
    AppState {
        db: database,
        config: Arc::new(config),
        email: EmailService::log_only(),
        uploader: ImageUploader::new(None),
        rate_limit: RateLimit::per_window(10_000, Duration::from_secs(60)).expect("quota"),
    }
}

async fn seed_admin(database: &Database) -> (ObjectId, Cookie<'static>) {
    let now = DateTime::now();
    let admin = User {
        id: ObjectId::new(),
        email: "admin@example.com".into(),
        password: hash_password("secret").expect("hash"),
        username: "admin".into(),
        role: Role::Admin,
        profile_image: None,
        bio: None,
        profession: None,
        created_at: now,
        updated_at: now,
    };
    database
        .collection::<User>(db::USERS)
        .insert_one(&admin, None)
        .await
        .expect("insert admin");
    let token = issue_token(&admin.id.to_hex(), Role::Admin, SECRET).expect("token");
    (admin.id, Cookie::new(SESSION_COOKIE, token))
}

fn product_body(name: &str, price: f64, author: ObjectId) -> Value {
    product_in("rings", name, price, author)
}

fn product_in(category: &str, name: &str, price: f64, author: ObjectId) -> Value {
    json!({
        "name": name,
        "category": category,
        "description": format!("{name} in 18k gold"),
        "price": price,
        "image": "https://cdn.example.com/ring.jpg",
        "gender": "female",
        "author": author.to_hex(),
    })
}

#[actix_web::test]
#[ignore = "Requires running MongoDB"]
async fn otp_is_single_use() {
    let (config, database) = fresh_database().await;
    let app = test::init_service(build_app(state(config, database.clone()))).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/send-otp")
        .set_json(json!({ "email": "Buyer@Example.com" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let otp = database
        .collection::<Otp>(db::OTPS)
        .find_one(doc! { "email": "buyer@example.com" }, None)
        .await
        .expect("query")
        .expect("otp stored");

    let verify = || {
        test::TestRequest::post()
            .uri("/api/auth/verify-otp")
            .set_json(json!({ "email": "buyer@example.com", "otp": otp.otp.clone() }))
            .to_request()
    };
    assert_eq!(test::call_service(&app, verify()).await.status(), StatusCode::OK);
    assert_eq!(test::call_service(&app, verify()).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
#[ignore = "Requires running MongoDB"]
async fn unknown_author_is_rejected() {
    let (config, database) = fresh_database().await;
    let (_, admin) = seed_admin(&database).await;
    let app = test::init_service(build_app(state(config, database.clone()))).await;

    let req = test::TestRequest::post()
        .uri("/api/product/create-product")
        .cookie(admin)
        .set_json(product_body("Solitaire", 900.0, ObjectId::new()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Invalid author ID");

    let stored = database
        .collection::<Product>(db::PRODUCTS)
        .count_documents(None, None)
        .await
        .expect("count");
    assert_eq!(stored, 0);
}

#[actix_web::test]
#[ignore = "Requires running MongoDB"]
async fn related_products_share_a_word_or_category() {
    let (config, database) = fresh_database().await;
    let (admin_id, admin) = seed_admin(&database).await;
    let app = test::init_service(build_app(state(config, database))).await;

    let mut ids = Vec::new();
    for (category, name) in [
        ("rings", "Rose Gold Ring"),
        ("necklaces", "Gold Necklace"),
        ("rings", "Silver Band"),
        ("earrings", "Pearl Studs"),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/product/create-product")
            .cookie(admin.clone())
            .set_json(product_in(category, name, 120.0, admin_id))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        ids.push(created["_id"].as_str().expect("id").to_string());
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/product/related/{}", ids[0]))
        .to_request();
    let related: Value = test::call_and_read_body_json(&app, req).await;
    let mut names: Vec<&str> = related
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|p| p["name"].as_str())
        .collect();
    names.sort_unstable();
    assert_eq!(names, ["Gold Necklace", "Silver Band"]);
}

#[actix_web::test]
#[ignore = "Requires running MongoDB"]
async fn reposting_a_review_replaces_it() {
    let (config, database) = fresh_database().await;
    let (admin_id, admin) = seed_admin(&database).await;
    let app = test::init_service(build_app(state(config, database.clone()))).await;

    let req = test::TestRequest::post()
        .uri("/api/product/create-product")
        .cookie(admin.clone())
        .set_json(product_body("Signet", 310.0, admin_id))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let product_id = created["_id"].as_str().expect("id").to_string();

    for (comment, rating) in [("Fine", 3), ("Grew on me", 5)] {
        let req = test::TestRequest::post()
            .uri("/api/reviews/post-review")
            .cookie(admin.clone())
            .set_json(json!({
                "comment": comment,
                "rating": rating,
                "userId": admin_id.to_hex(),
                "productId": product_id,
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }

    let stored: Vec<Review> = database
        .collection::<Review>(db::REVIEWS)
        .find(doc! { "userId": admin_id }, None)
        .await
        .expect("query")
        .try_collect()
        .await
        .expect("collect");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].rating, 5);
    assert_eq!(stored[0].comment, "Grew on me");
}

#[actix_web::test]
#[ignore = "Requires running MongoDB"]
async fn listing_paginates_and_search_matches() {
    let (config, database) = fresh_database().await;
    let (admin_id, admin) = seed_admin(&database).await;
    let app = test::init_service(build_app(state(config, database))).await;

    for i in 0..5 {
        let req = test::TestRequest::post()
            .uri("/api/product/create-product")
            .cookie(admin.clone())
            .set_json(product_body(&format!("Band {i}"), 100.0 + f64::from(i), admin_id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);
    }

    let req = test::TestRequest::get()
        .uri("/api/product?page=2&limit=2&sortBy=price&sortOrder=asc")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["totalProducts"], 5);
    assert_eq!(body["totalPages"], 3);
    assert_eq!(body["currentPage"], 2);
    assert_eq!(body["products"][0]["name"], "Band 2");

    let req = test::TestRequest::get()
        .uri("/api/product/search?query=band%204")
        .to_request();
    let found: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(found.as_array().map(Vec::len), Some(1));

    let req = test::TestRequest::get()
        .uri("/api/product/search?query=.*")
        .to_request();
    let literal: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(literal.as_array().map(Vec::len), Some(0));
}

#[actix_web::test]
#[ignore = "Requires running MongoDB"]
async fn deleting_a_product_removes_its_reviews() {
    let (config, database) = fresh_database().await;
    let (admin_id, admin) = seed_admin(&database).await;
    let app = test::init_service(build_app(state(config, database.clone()))).await;

    let req = test::TestRequest::post()
        .uri("/api/product/create-product")
        .cookie(admin.clone())
        .set_json(product_body("Pendant", 250.0, admin_id))
        .to_request();
    let created: Value = test::call_and_read_body_json(&app, req).await;
    let product_id = created["_id"].as_str().expect("id").to_string();

    let req = test::TestRequest::post()
        .uri("/api/reviews/post-review")
        .cookie(admin.clone())
        .set_json(json!({
            "comment": "Lovely",
            "rating": 5,
            "userId": admin_id.to_hex(),
            "productId": product_id,
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/product/{product_id}"))
        .cookie(admin)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let remaining = database
        .collection::<Review>(db::REVIEWS)
        .count_documents(doc! { "userId": admin_id }, None)
        .await
        .expect("count");
    assert_eq!(remaining, 0);
}

#[actix_web::test]
#[ignore = "Requires running MongoDB"]
async fn coupons_apply_and_feed_orders() {
    let (config, database) = fresh_database().await;
    let (admin_id, admin) = seed_admin(&database).await;
    let app = test::init_service(build_app(state(config, database))).await;

    let req = test::TestRequest::post()
        .uri("/api/coupon/create-coupon")
        .cookie(admin.clone())
        .set_json(json!({
            "code": "sparkle20",
            "discountPercentage": 20,
            "expiresAt": "2099-01-01T00:00:00Z",
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/coupon/apply")
        .set_json(json!({ "code": "SPARKLE20", "amount": 150.0 }))
        .to_request();
    let quote: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(quote["discountAmount"], 30.0);
    assert_eq!(quote["finalAmount"], 120.0);

    let admin_cookie = admin.clone();
    let req = test::TestRequest::post()
        .uri("/api/product/create-product")
        .cookie(admin)
        .set_json(product_body("Hoops", 75.0, admin_id))
        .to_request();
    let product: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri("/api/orders/create-order")
        .set_json(json!({
            "email": "buyer@example.com",
            "products": [{ "productId": product["_id"], "quantity": 2 }],
            "couponCode": "sparkle20",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = test::read_body_json(resp).await;
    assert_eq!(order["subtotal"], 150.0);
    assert_eq!(order["amount"], 120.0);
    assert_eq!(order["status"], "pending");

    let lookup = |cookie: Cookie<'static>| {
        test::TestRequest::get()
            .uri(&format!("/api/orders/order/{}", order["_id"].as_str().expect("id")))
            .cookie(cookie)
            .to_request()
    };
    let stranger = Cookie::new(
        SESSION_COOKIE,
        issue_token(&ObjectId::new().to_hex(), Role::User, SECRET).expect("token"),
    );
    assert_eq!(test::call_service(&app, lookup(stranger)).await.status(), StatusCode::FORBIDDEN);
    assert_eq!(test::call_service(&app, lookup(admin_cookie)).await.status(), StatusCode::OK);
}
