//! HTTP middleware and auth extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. Request ID (add unique ID to each request)
//! 3. `TraceLayer` (request tracing)
//! 4. CORS, compression
//! 5. Security headers
//! 6. Rate limiting (governor), per route group
//! 7. Body size limits, per route group

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;

pub use auth::{JWT_COOKIE, RequireAdmin, RequireAuth, logout_cookie, session_cookie};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter, rate_limit_response_middleware};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
