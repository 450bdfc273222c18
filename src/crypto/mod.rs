//! Password hashing and session token utilities.
//!
//! Passwords are stored as Argon2 PHC strings. Session tokens are 32 random
//! bytes handed to the client as hex; only their SHA-256 digest is persisted.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::Rng;
use sha2::{Digest, Sha256};
use lazy_static::lazy_static;
use subtle::ConstantTimeEq;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

lazy_static! {
    /// Stand-in hash for logins whose email matches no profile
    static ref DUMMY_HASH: String = hash_password("opsdesk-no-such-profile").unwrap_or_default();
}

/// Verify against the stand-in hash. Costs the same as a real check; the
/// result carries no meaning.
pub fn verify_password_against_dummy(password: &str) -> bool {
    verify_password(password, &DUMMY_HASH)
}

/// Generate a random session token
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

/// Hash a token for storage
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Constant-time comparison of two secrets
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let expected = expected.as_bytes();
    let provided = provided.as_bytes();
    expected.len() == provided.len() && expected.ct_eq(provided).into()
}

/// Validate password strength.
/// Returns None if valid, or Some(error_message) if invalid
pub fn validate_password_strength(password: &str) -> Option<String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Some(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Some("Password must contain at least one letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Some("Password must contain at least one digit".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter2hunter2", &hash));
        assert!(!verify_password("hunter3hunter3", &hash));
    }

    #[test]
    fn test_dummy_hash_is_a_real_argon2_hash() {
        assert!(DUMMY_HASH.starts_with("$argon2"));
        assert!(!verify_password_against_dummy("password123"));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_tokens_are_unique_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_token_is_stable() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
        assert_eq!(hash_token("abc").len(), 64);
    }

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match("token-1234", "token-1234"));
        assert!(!secrets_match("token-1234", "token-1235"));
        assert!(!secrets_match("token-1234", "token-12345"));
    }

    #[test]
    fn test_password_strength() {
        assert!(validate_password_strength("abc12345").is_none());
        assert!(validate_password_strength("short1").is_some());
        assert!(validate_password_strength("onlyletters").is_some());
        assert!(validate_password_strength("1234567890").is_some());
    }
}
