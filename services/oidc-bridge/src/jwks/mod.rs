//! Publication of the verification key set.

pub mod publisher;
pub mod thumbprint;

pub use publisher::{Jwk, Jwks, JwksPublisher};
pub use thumbprint::JwkThumbprint;
