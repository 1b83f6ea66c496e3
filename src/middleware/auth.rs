use std::rc::Rc;

use actix_service::{forward_ready, Service};
use actix_web::dev::{Payload, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use futures::future::{ok, ready, LocalBoxFuture, Ready};

use crate::error::AppError;
use crate::models::Claims;
use crate::services::auth::{decode_token, SESSION_COOKIE};

/// Decodes the session token, when one is present, and stores its `Claims`
/// in the request extensions. Requests without a valid token pass through
/// anonymously; the `AuthUser` and `AdminUser` extractors enforce access.
pub struct SessionMiddleware {
    secret: Rc<str>,
}

impl SessionMiddleware {
    pub fn new(secret: &str) -> Self {
        SessionMiddleware {
            secret: Rc::from(secret),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionMiddlewareService<S>;
    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SessionMiddlewareService {
            service: Rc::new(service),
            secret: self.secret.clone(),
        })
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
    secret: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(token) = session_token(req.request()) {
            match decode_token(&token, &self.secret) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims);
                }
                Err(e) => log::debug!("Ignoring invalid session token: {e}"),
            }
        }

        let service = self.service.clone();
        Box::pin(async move { service.call(req).await })
    }
}

/// Cookie first, then `Authorization: Bearer`.
fn session_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Any logged-in user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    /// The caller may act on `user_id` if it is their own id or they are an admin.
    pub fn ensure_owner_or_admin(&self, user_id: &str) -> Result<(), AppError> {
        if self.0.sub == user_id || self.0.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied".to_string()))
        }
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Claims>()
                .cloned()
                .map(AuthUser)
                .ok_or_else(|| AppError::Unauthorized("Unauthorized access".to_string())),
        )
    }
}

/// A logged-in user with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

impl FromRequest for AdminUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<Claims>().cloned();
        ready(match claims {
            Some(claims) if claims.is_admin() => Ok(AdminUser(claims)),
            Some(_) => Err(AppError::Forbidden(
                "You are not authorized to perform this action".to_string(),
            )),
            None => Err(AppError::Unauthorized("Unauthorized access".to_string())),
        })
    }
}
