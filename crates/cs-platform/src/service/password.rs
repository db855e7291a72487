//! Password Hashing
//!
//! Argon2id with a random salt per hash, stored as a PHC string.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::Rng;

use crate::error::{PlatformError, Result};

pub const MIN_PASSWORD_LENGTH: usize = 8;

const GENERATED_PASSWORD_LENGTH: usize = 12;
const GENERATED_PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";

#[derive(Clone, Default)]
pub struct PasswordService {
    argon2: Argon2<'static>,
}

impl PasswordService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject passwords shorter than [`MIN_PASSWORD_LENGTH`] characters.
    pub fn check_policy(&self, password: &str) -> Result<()> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(PlatformError::validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PlatformError::internal(format!("Password hashing failed: {}", e)))
    }

    /// Random replacement password handed out by an admin reset.
    pub fn generate_password(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..GENERATED_PASSWORD_LENGTH)
            .map(|_| GENERATED_PASSWORD_CHARSET[rng.gen_range(0..GENERATED_PASSWORD_CHARSET.len())] as char)
            .collect()
    }

    /// False on mismatch and on a malformed stored hash; never an error.
    pub fn verify_password(&self, password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self.argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(_) => false,
        }
    }
}
