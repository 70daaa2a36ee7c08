//! `storedesk-auth`: authentication and store-ownership boundary.
//!
//! Identity is delegated to an external provider: bearer tokens are HS256 JWTs
//! whose subject is the provider's user id, and the provider keeps the local
//! user table in sync through webhooks. This crate is decoupled from HTTP and
//! storage.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod user;

pub use authorize::{AuthzError, authorize_store};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use user::{IdentityEvent, User};
