use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

/// One-way password hashing primitive used by the auth service.
pub trait PasswordEncoder: Send + Sync {
    fn encode(&self, plain: &str) -> anyhow::Result<String>;

    /// `Ok(false)` on mismatch; `Err` only when `hash` cannot be parsed.
    fn matches(&self, plain: &str, hash: &str) -> anyhow::Result<bool>;
}

/// Argon2id with the crate's default parameters, PHC string output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Encoder;

impl PasswordEncoder for Argon2Encoder {
    fn encode(&self, plain: &str) -> anyhow::Result<String> {
        hash_password(plain)
    }

    fn matches(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        verify_password(plain, hash)
    }
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_and_match() {
        let encoder = Argon2Encoder;
        let password = "Secur3P@ssw0rd!";
        let hash = encoder.encode(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2"));
        assert_ne!(hash, password);
        assert!(encoder.matches(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("pw1").expect("hash a");
        let b = hash_password("pw1").expect("hash b");
        assert_ne!(a, b);
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        assert!(!verify_password("wrong-password", &hash).expect("verify should not error"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(!err.to_string().is_empty());
    }
}
