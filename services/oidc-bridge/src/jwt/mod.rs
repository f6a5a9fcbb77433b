pub mod claims;
pub mod issuer;

pub use claims::{ClaimSet, IdTokenClaims};
pub use issuer::{verify, IssuedToken, TokenIssuer, ID_TOKEN_TTL_SECS};
