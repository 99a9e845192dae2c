use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use crate::{error::AppError, utils::client_ip};
use std::{hash::Hash, net::IpAddr, num::NonZeroU32, sync::Arc, time::Duration};

/// Rate limiter keyed by an arbitrary value, e.g. an account identifier
pub type KeyedRateLimiter<K> = Arc<RateLimiter<K, DashMapStateStore<K>, DefaultClock>>;

/// Rate limiter keyed by client IP address
pub type IpRateLimiter = KeyedRateLimiter<IpAddr>;

/// `attempts` requests per `window_seconds`, replenished evenly, bursting up to `attempts`.
pub fn create_keyed_rate_limiter<K>(attempts: u32, window_seconds: u64) -> KeyedRateLimiter<K>
where
    K: Hash + Eq + Clone,
{
    let attempts = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
    let period_ms = (window_seconds.max(1) * 1000) / u64::from(attempts.get());
    let quota = Quota::with_period(Duration::from_millis(period_ms.max(1)))
        .unwrap_or_else(|| Quota::per_second(attempts))
        .allow_burst(attempts);

    Arc::new(RateLimiter::dashmap(quota))
}

pub fn create_ip_rate_limiter(attempts: u32, window_seconds: u64) -> IpRateLimiter {
    create_keyed_rate_limiter(attempts, window_seconds)
}

/// Spends one unit of `key`'s quota, or fails with 429 and the wait until the next unit.
pub fn check_keyed_limit<K>(
    limiter: &KeyedRateLimiter<K>,
    key: &K,
    message: &str,
) -> Result<(), AppError>
where
    K: Hash + Eq + Clone,
{
    limiter.check_key(key).map_err(|negative| {
        let wait_time = negative.wait_time_from(DefaultClock::default().now());
        AppError::TooManyRequests(message.to_string(), Some(wait_time.as_secs().max(1)))
    })
}

/// Rejects with 429 and `Retry-After` once the caller's IP exhausts its quota.
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match client_ip(request.headers(), request.extensions()) {
        Some(ip) => {
            if let Err(e) = check_keyed_limit(
                &limiter,
                &ip,
                "Too many requests from this IP. Please try again later.",
            ) {
                tracing::warn!(ip = %ip, "Rate limit exceeded");
                return Err(e);
            }
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}
