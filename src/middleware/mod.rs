mod auth;
mod rate_limit;

pub use auth::{AdminUser, AuthUser, SessionMiddleware};
pub use rate_limit::RateLimit;
