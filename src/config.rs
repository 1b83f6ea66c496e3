use std::env;
use std::str::FromStr;

use thiserror::Error;

const DEV_ORIGINS: [&str; 3] = [
    "http://localhost:5173",
    "http://localhost:3000",
    "http://localhost:3001",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_name: String,
    pub port: u16,
    pub jwt_secret: String,
    pub allowed_origins: Vec<String>,
    pub cookie_secure: bool,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    /// Believe `Forwarded` / `X-Forwarded-For` when keying the rate limiter.
    pub trust_proxy: bool,
    pub smtp: Option<SmtpConfig>,
    pub cloudinary: Option<CloudinaryConfig>,
}

impl Config {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut allowed_origins: Vec<String> = DEV_ORIGINS.iter().map(|o| o.to_string()).collect();
        if let Some(frontend) = optional("FRONTEND_URL") {
            allowed_origins.push(frontend);
        }
        if let Some(extra) = optional("ALLOWED_ORIGINS") {
            allowed_origins.extend(
                extra
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string),
            );
        }

        let smtp = match optional("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", 587)?,
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
                from_address: required("EMAIL_FROM")?,
            }),
            None => None,
        };

        let cloudinary = match optional("CLOUDINARY_CLOUD_NAME") {
            Some(cloud_name) => Some(CloudinaryConfig {
                cloud_name,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
            }),
            None => None,
        };

        Ok(Config {
            database_url: required("DB_URL")?,
            database_name: optional("DB_NAME").unwrap_or_else(|| "jewelry_store".to_string()),
            port: parse_or("PORT", 4000)?,
            jwt_secret: required("JWT_SECRET_KEY")?,
            allowed_origins,
            cookie_secure: parse_or("COOKIE_SECURE", true)?,
            rate_limit_max: parse_or("RATE_LIMIT_MAX", 100)?,
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW_SECS", 15 * 60)?,
            trust_proxy: parse_or("TRUST_PROXY", false)?,
            smtp,
            cloudinary,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    optional(key).ok_or(ConfigError::Missing(key))
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => {
            log::debug!("{key} not set, using default");
            Ok(default)
        }
    }
}

#[cfg(test)]
impl Config {
    /// Configuration for handler tests; no external services.
    pub fn for_tests() -> Self {
        Config {
            database_url: "mongodb://localhost:27017".to_string(),
            database_name: "jewelry_store_test".to_string(),
            port: 0,
            jwt_secret: "test-secret".to_string(),
            allowed_origins: DEV_ORIGINS.iter().map(|o| o.to_string()).collect(),
            cookie_secure: false,
            rate_limit_max: 1000,
            rate_limit_window_secs: 60,
            trust_proxy: false,
            smtp: None,
            cloudinary: None,
        }
    }
}
