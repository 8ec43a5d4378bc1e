//! Credential service - password hashing and verification
//!
//! Hashes are Argon2id PHC strings with a random per-hash salt. The service
//! holds no state besides cost parameters and never touches storage.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::domain::result::{Error, Result};
use crate::domain::Argon2Params;

pub struct CredentialService {
    params: Argon2Params,
}

impl CredentialService {
    pub fn new(params: Argon2Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.params.memory_cost,
            self.params.time_cost,
            self.params.parallelism,
            None,
        )
        .map_err(|e| Error::Config(format!("Invalid Argon2 parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a plaintext password into a PHC string
    pub fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()?
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| Error::Config(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Check a plaintext password against a stored PHC string
    ///
    /// A malformed stored hash never verifies. The parameters embedded in
    /// the hash are used, so old hashes survive a cost change.
    pub fn verify(&self, plaintext: &str, stored: &str) -> bool {
        match PasswordHash::new(stored) {
            Ok(parsed) => Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CredentialService {
        CredentialService::new(Argon2Params {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        })
    }

    #[test]
    fn test_hash_and_verify() {
        let service = service();
        let hash = service.hash("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(service.verify("correct horse", &hash));
        assert!(!service.verify("wrong horse", &hash));
    }

    #[test]
    fn test_salts_differ() {
        let service = service();
        assert_ne!(service.hash("same").unwrap(), service.hash("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_does_not_verify() {
        assert!(!service().verify("anything", "not-a-phc-string"));
        assert!(!service().verify("", ""));
    }

    #[test]
    fn test_hash_from_other_params_still_verifies() {
        let old = service().hash("pw").unwrap();
        let stronger = CredentialService::new(Argon2Params {
            memory_cost: 2048,
            time_cost: 2,
            parallelism: 1,
        });
        assert!(stronger.verify("pw", &old));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let broken = CredentialService::new(Argon2Params {
            memory_cost: 1,
            time_cost: 0,
            parallelism: 0,
        });
        assert!(broken.hash("pw").is_err());
    }
}
