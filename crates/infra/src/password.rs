//! Password encoding (argon2id, PHC string format).

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("failed to gather salt entropy: {0}")]
    Entropy(String),

    #[error("failed to hash password: {0}")]
    Hash(String),
}

pub trait PasswordEncoder: Send + Sync {
    fn encode(&self, raw: &str) -> Result<String, PasswordError>;

    /// Whether `raw` verifies against `encoded`. An empty or unparseable
    /// encoded value never matches.
    fn matches(&self, raw: &str, encoded: &str) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct Argon2PasswordEncoder {
    params: Params,
}

impl Argon2PasswordEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Custom cost parameters (e.g. cheaper hashes in tests). Verification
    /// always uses the parameters recorded in the encoded hash.
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordEncoder for Argon2PasswordEncoder {
    fn encode(&self, raw: &str) -> Result<String, PasswordError> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| PasswordError::Entropy(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| PasswordError::Hash(e.to_string()))?;
        let phc = self
            .hasher()
            .hash_password(raw.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(phc.to_string())
    }

    fn matches(&self, raw: &str, encoded: &str) -> bool {
        match PasswordHash::new(encoded) {
            Ok(parsed) => self.hasher().verify_password(raw.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
pub(crate) fn cheap_encoder() -> Argon2PasswordEncoder {
    Argon2PasswordEncoder::with_params(Params::new(Params::MIN_M_COST, 1, 1, None).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_password_verifies() {
        let encoder = cheap_encoder();
        let encoded = encoder.encode("s3cret").unwrap();
        assert!(encoded.starts_with("$argon2id$"));
        assert!(encoder.matches("s3cret", &encoded));
        assert!(!encoder.matches("S3cret", &encoded));
    }

    #[test]
    fn salts_differ_between_encodings() {
        let encoder = cheap_encoder();
        assert_ne!(encoder.encode("same").unwrap(), encoder.encode("same").unwrap());
    }

    #[test]
    fn empty_hash_never_matches() {
        let encoder = cheap_encoder();
        assert!(!encoder.matches("", ""));
        assert!(!encoder.matches("anything", ""));
        assert!(!encoder.matches("anything", "not-a-phc-string"));
    }
}
