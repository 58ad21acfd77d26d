//! Key authentication, rate limiting, statement validation and redaction.

pub mod auth;
pub mod clock;
#[cfg(test)]
pub(crate) mod mocks;
pub mod rate_limiter;
pub mod redactor;
pub mod validator;

pub use auth::KeyAuthenticator;
pub use clock::{Clock, SystemClock};
pub use rate_limiter::{RateDecision, RateLimitStatus, RateLimiter, RateLimiterBuilder};
pub use redactor::{MASK, Redactor};
pub use validator::StatementValidator;
