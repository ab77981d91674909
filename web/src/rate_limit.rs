//! Per-client request rate limiting with token buckets.
//!
//! ```text
//! Client IP ──▶ Bucket (capacity: 100 tokens, refilled evenly over the window)
//!               ├─ Each request consumes one token
//!               └─ No token left → 429 RATE_LIMITED, Retry-After set
//! ```
//!
//! The client is the connection's peer address (`ConnectInfo<SocketAddr>`),
//! or the first `X-Forwarded-For` / `X-Real-IP` address when the server runs
//! behind a trusted proxy. At most `max_clients` buckets are kept; buckets
//! idle for a whole window are full again and are dropped first.

use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request},
    http::{HeaderMap, HeaderValue, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};

/// Rate limiter configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests allowed per client per window (also the burst size)
    pub requests: u32,
    /// Window over which `requests` tokens are refilled
    pub window: Duration,
    /// Upper bound on clients tracked at once
    pub max_clients: usize,
    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`
    pub trust_forwarded: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window: Duration::from_secs(15 * 60),
            max_clients: 10_000,
            trust_forwarded: false,
        }
    }
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token buckets keyed by client address.
#[derive(Debug)]
pub struct ClientBuckets {
    capacity: f64,
    refill_per_sec: f64,
    window: Duration,
    max_clients: usize,
    buckets: Mutex<HashMap<IpAddr, Bucket>>,
}

impl ClientBuckets {
    /// Create an empty set of buckets; each client starts full.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = f64::from(config.requests);
        let window = config.window.as_secs_f64();
        Self {
            capacity,
            refill_per_sec: if window > 0.0 { capacity / window } else { f64::INFINITY },
            window: config.window,
            max_clients: config.max_clients.max(1),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token from `client`'s bucket.
    ///
    /// # Errors
    ///
    /// Returns the wait until the next token when the bucket is empty.
    pub fn try_acquire(&self, client: IpAddr) -> Result<(), Duration> {
        self.try_acquire_at(client, Instant::now())
    }

    /// Number of clients currently holding a bucket.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn try_acquire_at(&self, client: IpAddr, now: Instant) -> Result<(), Duration> {
        if self.refill_per_sec.is_infinite() {
            return Ok(());
        }

        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        if !buckets.contains_key(&client) && buckets.len() >= self.max_clients {
            self.evict(&mut buckets, now);
        }

        let bucket = buckets.entry(client).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else if self.refill_per_sec > 0.0 {
            Err(Duration::try_from_secs_f64((1.0 - bucket.tokens) / self.refill_per_sec).unwrap_or(Duration::MAX))
        } else {
            Err(Duration::MAX)
        }
    }

    fn evict(&self, buckets: &mut HashMap<IpAddr, Bucket>, now: Instant) {
        // A bucket untouched for a whole window has refilled completely.
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < self.window);

        if buckets.len() >= self.max_clients {
            let oldest = buckets
                .iter()
                .min_by_key(|(_, bucket)| bucket.last_refill)
                .map(|(ip, _)| *ip);
            if let Some(ip) = oldest {
                buckets.remove(&ip);
            }
        }
    }
}

/// Address of the client that sent `req`.
///
/// Falls back to the unspecified address (one shared bucket) when no peer
/// address is known.
fn client_addr(req: &Request, trust_forwarded: bool) -> IpAddr {
    if trust_forwarded {
        if let Some(ip) = forwarded_addr(req.headers()) {
            return ip;
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |ConnectInfo(addr)| addr.ip())
}

/// First `X-Forwarded-For` address, else `X-Real-IP`.
fn forwarded_addr(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("X-Forwarded-For")
        .and_then(|value| value.to_str().ok())
        .and_then(|list| list.split(',').next())
        .and_then(|first| first.trim().parse().ok())
        .or_else(|| {
            headers
                .get("X-Real-IP")
                .and_then(|value| value.to_str().ok())
                .and_then(|ip| ip.trim().parse().ok())
        })
}

/// Create a layer enforcing `config` per client.
#[must_use]
pub fn rate_limit_layer(config: RateLimitConfig) -> RateLimitLayer {
    RateLimitLayer {
        buckets: Arc::new(ClientBuckets::new(config)),
        trust_forwarded: config.trust_forwarded,
    }
}

/// Layer for per-client rate limiting.
#[derive(Clone, Debug)]
pub struct RateLimitLayer {
    buckets: Arc<ClientBuckets>,
    trust_forwarded: bool,
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            buckets: Arc::clone(&self.buckets),
            trust_forwarded: self.trust_forwarded,
        }
    }
}

/// Middleware service for per-client rate limiting.
#[derive(Clone, Debug)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    buckets: Arc<ClientBuckets>,
    trust_forwarded: bool,
}

impl<S> Service<Request> for RateLimitMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let client = client_addr(&req, self.trust_forwarded);

        match self.buckets.try_acquire(client) {
            Ok(()) => Box::pin(self.inner.call(req)),
            Err(wait) => {
                tracing::warn!(
                    client = %client,
                    uri = %req.uri(),
                    retry_after_ms = wait.as_millis(),
                    "Rate limit exceeded"
                );

                let mut response = AppError::rate_limited().into_response();
                let seconds = wait.as_secs().saturating_add(1);
                if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                    response.headers_mut().insert(RETRY_AFTER, value);
                }
                Box::pin(async move { Ok(response) })
            }
        }
    }
}
