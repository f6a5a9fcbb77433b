//! OIDC bridge library.
//!
//! Exchanges Discord OAuth2 authorization codes for signed OpenID Connect ID
//! tokens and publishes the matching verification key set.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod idp;
pub mod jwks;
pub mod jwt;
pub mod keys;
pub mod metrics;

// Re-exports for convenience
pub use config::Config;
pub use error::BridgeError;
