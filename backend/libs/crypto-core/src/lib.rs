//! Shared token primitives for the community backend.
//!
//! The only module today is [`jwt`]: RS256 access-token verification used by
//! every HTTP surface, plus an issuer for development tooling and tests.
pub mod jwt;

pub use jwt::{Claims, TokenError, TokenIssuer, TokenVerifier};
