use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::HttpServer;
use jewelry_store::config::Config;
use jewelry_store::middleware::RateLimit;
use jewelry_store::services::email::EmailService;
use jewelry_store::services::upload::ImageUploader;
use jewelry_store::{build_app, db, AppState};

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{context}: {err}"))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| startup_error("invalid configuration", e))?;

    let db = db::connect(&config)
        .await
        .map_err(|e| startup_error("failed to connect to MongoDB", e))?;
    db::ensure_indexes(&db)
        .await
        .map_err(|e| startup_error("failed to create indexes", e))?;
    log::info!("Connected to MongoDB database {}", config.database_name);

    let email = EmailService::new(config.smtp.as_ref())
        .map_err(|e| startup_error("invalid SMTP settings", e))?;
    let uploader = ImageUploader::new(config.cloudinary.clone());
    let rate_limit = RateLimit::per_window(
        config.rate_limit_max,
        Duration::from_secs(config.rate_limit_window_secs),
    )
    .ok_or_else(|| startup_error("invalid rate limit", "limit and window must be non-zero"))?
    .trust_proxy(config.trust_proxy);

    let port = config.port;
    let state = AppState {
        db,
        config: Arc::new(config),
        email,
        uploader,
        rate_limit,
    };

    log::info!("Server running on port {port}");
    HttpServer::new(move || build_app(state.clone()))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
