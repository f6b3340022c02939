// src/security/mod.rs — Dashboard authentication and input hygiene

pub mod auth;
pub mod cookies;
pub mod csp;
pub mod rate_limit;
pub mod validation;

pub use auth::{CredentialVerifier, Identity, StaticCredentialVerifier};
pub use rate_limit::RateLimiter;
