use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix_service::{forward_ready, Service};
use actix_web::body::EitherBody;
use actix_web::dev::{ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, ResponseError};
use futures::future::{ok, LocalBoxFuture, Ready};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::error::AppError;

/// Checks between sweeps of idle client entries.
const PRUNE_EVERY: u64 = 1024;

/// Requests allowed per client IP within a fixed window, replenished evenly
/// across the window. Shared by every worker.
///
/// Clients are keyed on the socket peer. Forwarding headers are only
/// believed when `trust_proxy` is set, i.e. when a reverse proxy that
/// overwrites them sits in front of the server.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    checks: Arc<AtomicU64>,
    trust_proxy: bool,
}

impl RateLimit {
    /// `None` when either bound is zero.
    pub fn per_window(max_requests: u32, window: Duration) -> Option<Self> {
        let burst = NonZeroU32::new(max_requests)?;
        let quota = Quota::with_period(window / burst.get())?.allow_burst(burst);
        Some(RateLimit {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            checks: Arc::new(AtomicU64::new(0)),
            trust_proxy: false,
        })
    }

    pub fn trust_proxy(mut self, trust: bool) -> Self {
        self.trust_proxy = trust;
        self
    }

    fn check(&self, ip: IpAddr) -> bool {
        let seen = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % PRUNE_EVERY == 0 {
            self.prune();
        }
        self.limiter.check_key(&ip).is_ok()
    }

    /// Drops clients whose quota has fully replenished.
    fn prune(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        log::debug!("Rate limiter tracking {} clients", self.limiter.len());
    }

    fn client_ip(&self, req: &ServiceRequest) -> Option<IpAddr> {
        if self.trust_proxy {
            let forwarded = req
                .connection_info()
                .realip_remote_addr()
                .and_then(|addr| {
                    addr.parse::<IpAddr>()
                        .ok()
                        .or_else(|| addr.parse::<SocketAddr>().ok().map(|s| s.ip()))
                });
            if forwarded.is_some() {
                return forwarded;
            }
        }
        req.peer_addr().map(|addr| addr.ip())
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitService<S>;
    type InitError = ();

    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitService {
            service: Rc::new(service),
            limit: self.clone(),
        })
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    limit: RateLimit,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if let Some(ip) = self.limit.client_ip(&req) {
            if !self.limit.check(ip) {
                log::warn!("Rate limit exceeded for {ip}");
                let response = AppError::TooManyRequests.error_response();
                return Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) });
            }
        }

        let service = self.service.clone();
        Box::pin(async move {
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
