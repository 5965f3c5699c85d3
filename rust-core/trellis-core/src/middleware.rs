//! # Middleware System
//!
//! Request/response interception around action dispatch: access logging,
//! CORS headers and rate limiting.
//!
//! `before_request` hooks run in registration order once a route has matched
//! and its guards passed; the first hook returning a response short-circuits
//! the action. `after_response` hooks run in reverse order on every response
//! the dispatcher produces, including 404s and error bodies.

use crate::request::Request;
use crate::response::Response;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Middleware trait for request/response interception
pub trait Middleware: Send + Sync {
    /// Called before parameter binding and the action
    ///
    /// Can return early with a response.
    fn before_request(&self, _req: &Request) -> MiddlewareResult {
        MiddlewareResult::Continue
    }

    /// Called after the response is produced
    fn after_response(&self, _req: &Request, _res: &mut Response) {}

    /// Middleware name for logging
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

/// Result of middleware execution
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Continue to next middleware/action
    Continue,
    /// Short-circuit with this response (skip action)
    Respond(Response),
}

/// Ordered middleware chain
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new empty middleware chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Execute `before_request` for all middlewares
    pub fn run_before(&self, req: &Request) -> MiddlewareResult {
        for mw in &self.middlewares {
            if let MiddlewareResult::Respond(response) = mw.before_request(req) {
                tracing::debug!(middleware = mw.name(), "Middleware short-circuited request");
                return MiddlewareResult::Respond(response);
            }
        }
        MiddlewareResult::Continue
    }

    /// Execute `after_response` for all middlewares (in reverse order)
    pub fn run_after(&self, req: &Request, res: &mut Response) {
        for mw in self.middlewares.iter().rev() {
            mw.after_response(req, res);
        }
    }

    /// Names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|mw| mw.name()).collect()
    }

    /// Get the number of middlewares
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Logging middleware - one structured event per request and response
#[derive(Default)]
pub struct LoggingMiddleware {
    log_headers: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable header logging
    #[must_use]
    pub fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

impl Middleware for LoggingMiddleware {
    fn before_request(&self, req: &Request) -> MiddlewareResult {
        let request_id = req.header("x-request-id").unwrap_or("-");
        if self.log_headers {
            info!(
                method = %req.method,
                path = %req.path,
                request_id = %request_id,
                headers = ?req.headers_map(),
                "Request received"
            );
        } else {
            info!(
                method = %req.method,
                path = %req.path,
                request_id = %request_id,
                "Request received"
            );
        }
        MiddlewareResult::Continue
    }

    fn after_response(&self, req: &Request, res: &mut Response) {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            request_id = %request_id,
            "Response sent"
        );
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}

/// CORS middleware - adds Cross-Origin Resource Sharing headers
#[derive(Clone)]
pub struct CorsMiddleware {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, DELETE, PATCH, OPTIONS".to_string(),
            allow_headers: "Content-Type, Authorization".to_string(),
        }
    }
}

impl CorsMiddleware {
    /// Create a new CORS middleware with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set allowed origin
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    /// Set allowed methods
    #[must_use]
    pub fn allow_methods(mut self, methods: impl Into<String>) -> Self {
        self.allow_methods = methods.into();
        self
    }

    /// Set allowed headers
    #[must_use]
    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.allow_headers = headers.into();
        self
    }

    /// Get the Access-Control-Allow-Origin header value
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.allow_origin
    }
}

impl Middleware for CorsMiddleware {
    fn after_response(&self, _req: &Request, res: &mut Response) {
        res.set_header("Access-Control-Allow-Origin", &self.allow_origin);
        res.set_header("Access-Control-Allow-Methods", &self.allow_methods);
        res.set_header("Access-Control-Allow-Headers", &self.allow_headers);
    }

    fn name(&self) -> &'static str {
        "CorsMiddleware"
    }
}

/// Token bucket rate limiting keyed by client IP
///
/// Buckets idle for longer than the idle TTL are dropped on the next sweep.
/// The default TTL is the time an empty bucket takes to refill, so an evicted
/// bucket is indistinguishable from a fresh one.
pub struct RateLimitMiddleware {
    /// Maximum burst capacity
    capacity: u64,
    /// Tokens refilled per second
    refill_per_sec: u64,
    /// Idle time after which a bucket is forgotten
    idle_ttl: Duration,
    state: Mutex<Buckets>,
}

struct Bucket {
    tokens: u64,
    last_refill: Instant,
    last_seen: Instant,
}

struct Buckets {
    by_key: HashMap<String, Bucket>,
    last_sweep: Instant,
}

impl RateLimitMiddleware {
    /// Idle TTL used when buckets never refill
    pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(60);

    /// Create a new rate limiter
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(capacity: u64, refill_per_sec: u64) -> Self {
        let idle_ttl = if refill_per_sec == 0 {
            Self::DEFAULT_IDLE_TTL
        } else {
            Duration::from_secs_f64(capacity as f64 / refill_per_sec as f64)
        };
        Self {
            capacity,
            refill_per_sec,
            idle_ttl,
            state: Mutex::new(Buckets {
                by_key: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Override how long an untouched bucket is kept
    #[must_use]
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    /// Number of clients currently holding a bucket
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_key
            .len()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn allow(&self, key: &str) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if now.duration_since(state.last_sweep) >= self.idle_ttl {
            let ttl = self.idle_ttl;
            let before = state.by_key.len();
            state
                .by_key
                .retain(|_, bucket| now.duration_since(bucket.last_seen) < ttl);
            state.last_sweep = now;
            let evicted = before - state.by_key.len();
            if evicted > 0 {
                debug!(evicted, remaining = state.by_key.len(), "Evicted idle rate limit buckets");
            }
        }

        let bucket = state.by_key.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            last_refill: now,
            last_seen: now,
        });
        bucket.last_seen = now;
        let elapsed = now.duration_since(bucket.last_refill);
        let refill = (elapsed.as_secs_f64() * self.refill_per_sec as f64) as u64;
        if refill > 0 {
            bucket.tokens = (bucket.tokens + refill).min(self.capacity);
            bucket.last_refill = now;
        }
        if bucket.tokens == 0 {
            return false;
        }
        bucket.tokens -= 1;
        true
    }
}

impl Middleware for RateLimitMiddleware {
    fn before_request(&self, req: &Request) -> MiddlewareResult {
        let key = req.header("x-client-ip").unwrap_or("unknown");
        if self.allow(key) {
            MiddlewareResult::Continue
        } else {
            MiddlewareResult::Respond(
                Response::json(
                    r#"{"error":{"code":"RATE_LIMITED","status":429,"message":"Rate limit exceeded"}}"#,
                )
                .with_status(429),
            )
        }
    }

    fn name(&self) -> &'static str {
        "RateLimitMiddleware"
    }
}
