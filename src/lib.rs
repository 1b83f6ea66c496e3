use std::sync::Arc;

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::http::{header, Method};
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App};
use mongodb::Database;

pub mod config;
pub mod db;
pub mod error;
pub mod json;
pub mod listing;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use error::AppError;
use middleware::{RateLimit, SessionMiddleware};
use models::{Banner, Cart, Coupon, Deal, Hero, Order, Otp, Product, Review, User};
use services::email::EmailService;
use services::upload::ImageUploader;

const JSON_LIMIT: usize = 25 * 1024 * 1024;

/// Everything a worker needs to build its `App`. Cloned once per worker.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub email: EmailService,
    pub uploader: ImageUploader,
    pub rate_limit: RateLimit,
}

impl AppState {
    fn register(&self, cfg: &mut web::ServiceConfig) {
        let db = &self.db;
        cfg.app_data(web::Data::new(db.collection::<User>(db::USERS)))
            .app_data(web::Data::new(db.collection::<Product>(db::PRODUCTS)))
            .app_data(web::Data::new(db.collection::<Review>(db::REVIEWS)))
            .app_data(web::Data::new(db.collection::<Banner>(db::BANNERS)))
            .app_data(web::Data::new(db.collection::<Hero>(db::HEROES)))
            .app_data(web::Data::new(db.collection::<Cart>(db::CARTS)))
            .app_data(web::Data::new(db.collection::<Order>(db::ORDERS)))
            .app_data(web::Data::new(db.collection::<Coupon>(db::COUPONS)))
            .app_data(web::Data::new(db.collection::<Deal>(db::DEALS)))
            .app_data(web::Data::new(db.collection::<Otp>(db::OTPS)))
            .app_data(web::Data::from(self.config.clone()))
            .app_data(web::Data::new(self.email.clone()))
            .app_data(web::Data::new(self.uploader.clone()))
            .app_data(
                web::JsonConfig::default()
                    .limit(JSON_LIMIT)
                    .error_handler(|err, _req| AppError::bad_request(err.to_string()).into()),
            )
            .app_data(
                web::QueryConfig::default()
                    .error_handler(|err, _req| AppError::bad_request(err.to_string()).into()),
            )
            .app_data(
                web::PathConfig::default()
                    .error_handler(|err, _req| AppError::bad_request(err.to_string()).into()),
            );
    }
}

fn cors(allowed_origins: &[String]) -> Cors {
    let origins = allowed_origins.to_vec();
    Cors::default()
        .allowed_origin_fn(move |origin, _head| {
            origins.iter().any(|allowed| allowed.as_bytes() == origin.as_bytes())
        })
        .allowed_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allowed_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .supports_credentials()
        .max_age(3600)
}

fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "no-referrer"))
        .add(("Cross-Origin-Resource-Policy", "cross-origin"))
}

pub fn build_app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let rate_limit = state.rate_limit.clone();
    App::new()
        .configure(|cfg| state.register(cfg))
        .wrap(SessionMiddleware::new(&state.config.jwt_secret))
        .wrap(security_headers())
        .wrap(cors(&state.config.allowed_origins))
        .wrap(Logger::default())
        .configure(|cfg| routes::configure(cfg, rate_limit))
        .default_service(web::to(routes::not_found))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use actix_web::cookie::Cookie;
    use mongodb::bson::oid::ObjectId;
    use mongodb::Client;

    use super::*;
    use crate::models::Role;
    use crate::services::auth::{issue_token, SESSION_COOKIE};

    /// Full application over a client that never connects unless a handler
    /// reaches the database.
    pub async fn test_app() -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<impl MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let config = Config::for_tests();
        let client = Client::with_uri_str("mongodb://127.0.0.1:27017/?serverSelectionTimeoutMS=500")
            .await
            .expect("client options should parse");
        let state = AppState {
            db: client.database(&config.database_name),
            config: Arc::new(config),
            email: EmailService::log_only(),
            uploader: ImageUploader::new(None),
            rate_limit: RateLimit::per_window(10_000, Duration::from_secs(60))
                .expect("non-zero quota"),
        };
        build_app(state)
    }

    fn cookie_for(user_id: &str, role: Role) -> Cookie<'static> {
        let token = issue_token(user_id, role, &Config::for_tests().jwt_secret)
            .expect("token should encode");
        Cookie::new(SESSION_COOKIE, token)
    }

    pub fn admin_cookie() -> Cookie<'static> {
        cookie_for(&ObjectId::new().to_hex(), Role::Admin)
    }

    pub fn user_cookie(user_id: &str) -> Cookie<'static> {
        cookie_for(user_id, Role::User)
    }
}
