//! Password hashing boundary.

use crate::token::AuthError;

pub use bcrypt::DEFAULT_COST;

/// Password hashing contract.
///
/// Comparison is delegated to the hashing primitive, which is constant-time;
/// callers must surface a uniform error regardless of which check failed.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError>;
}

impl<T: PasswordHasher + ?Sized> PasswordHasher for std::sync::Arc<T> {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        (**self).hash(password)
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        (**self).verify(password, hash)
    }
}

/// bcrypt-backed hasher.
#[derive(Debug, Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Override the work factor. Tests use a low cost to stay fast.
    pub fn with_cost(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordHasher for BcryptPasswordHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        bcrypt::hash(password, self.cost).map_err(|e| AuthError::Hashing(e.to_string()))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        bcrypt::verify(password, hash).map_err(|e| AuthError::Hashing(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> BcryptPasswordHasher {
        BcryptPasswordHasher::with_cost(4)
    }

    #[test]
    fn hash_is_not_the_password_and_verifies() {
        let h = hasher();
        let hash = h.hash("pw12345678").unwrap();

        assert_ne!(hash, "pw12345678");
        assert!(h.verify("pw12345678", &hash).unwrap());
        assert!(!h.verify("wrong-password", &hash).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let h = hasher();
        let a = h.hash("pw12345678").unwrap();
        let b = h.hash("pw12345678").unwrap();
        assert_ne!(a, b);
    }
}
