//! `jobhub-auth` — session tokens and password hashing.
//!
//! This crate is intentionally decoupled from HTTP and storage: it signs and
//! verifies session claims and hashes passwords, nothing more.

pub mod claims;
pub mod password;
pub mod token;

pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use password::{BcryptPasswordHasher, PasswordHasher};
pub use token::{AuthError, Hs256TokenSigner, TokenSigner};
