//! Password Hashing
//! Mission: Salted bcrypt hashing with a bounded input length

use anyhow::{Context, Result};
use bcrypt::DEFAULT_COST;

/// bcrypt only reads the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Cuts `password` to at most 72 bytes without splitting a UTF-8 character.
pub fn truncate_password(password: &str) -> &str {
    if password.len() <= MAX_PASSWORD_BYTES {
        return password;
    }
    let mut end = MAX_PASSWORD_BYTES;
    while !password.is_char_boundary(end) {
        end -= 1;
    }
    &password[..end]
}

/// bcrypt hasher with a configurable work factor
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password. Output differs per call because of the random salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        bcrypt::hash(truncate_password(password), self.cost).context("Failed to hash password")
    }

    /// Check a password against a stored hash. A malformed hash is a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        bcrypt::verify(truncate_password(password), hash).unwrap_or(false)
    }
}
