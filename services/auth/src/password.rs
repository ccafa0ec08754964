//! Salted one-way password hashing with Argon2

use anyhow::Result;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(hash)
}

/// `Ok(false)` for a wrong password, `Err` only for a corrupt stored hash
pub fn verify_password(password_hash: &str, password: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("Secret@123").unwrap();

        assert!(verify_password(&hash, "Secret@123").unwrap());
        assert!(!verify_password(&hash, "Secret@124").unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        assert_ne!(
            hash_password("Secret@123").unwrap(),
            hash_password("Secret@123").unwrap()
        );
    }

    #[test]
    fn corrupt_hash_is_an_error() {
        assert!(verify_password("not-a-phc-string", "Secret@123").is_err());
    }
}
