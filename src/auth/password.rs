use bcrypt::{hash, verify, DEFAULT_COST};

/// Hash a password for storage.
pub fn hash_password(plain: &str) -> Result<String, bcrypt::BcryptError> {
    hash(plain, DEFAULT_COST)
}

/// Check a password attempt against a stored hash.
pub fn verify_password(plain: &str, password_hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(plain, password_hash)
}
