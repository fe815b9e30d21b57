//! Authentication module for the BiteReserve server
//!
//! Password accounts, JWT-backed sessions, the request extractors that
//! resolve them, and per-client rate limiting.

pub mod extractor;
pub mod handlers;
mod service;
mod rate_limit;

pub use extractor::{AdminUser, AuthenticatedUser};
pub use service::{AuthService, Claims, hash_password, is_valid_email, normalize_email, verify_password};
pub use rate_limit::{RateLimiter, RateLimitConfig, LOGIN_BUCKET, RESERVATION_BUCKET, TRACKING_BUCKET};
