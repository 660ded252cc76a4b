//! This file defines the type that handles password hashing and verification.

use std::fmt::Display;

use bcrypt::{hash, verify};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hash a raw password string with the specified `cost`.
    ///
    /// `cost` increases the rounds of hashing and therefore the time needed to verify a password.
    /// Pass in [PasswordHash::DEFAULT_COST] outside of tests.
    ///
    /// # Errors
    ///
    /// This function will return an error if the password could not be hashed.
    pub fn from_raw_password(raw_password: &str, cost: u32) -> Result<Self, AppError> {
        match hash(raw_password, cost) {
            Ok(password_hash) => Ok(Self(password_hash)),
            Err(e) => Err(AppError::Hashing(e.to_string())),
        }
    }

    /// Create a new `PasswordHash` without any validation.
    ///
    /// The caller should ensure that `raw_password_hash` is a valid password hash.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if an invalid hash
    /// is provided it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_string())
    }

    /// Check that `raw_password` matches the stored password.
    ///
    /// # Errors
    ///
    /// This function will return an error if the stored string is not a valid bcrypt hash.
    pub fn verify(&self, raw_password: &str) -> Result<bool, AppError> {
        verify(raw_password, &self.0).map_err(|e| AppError::Hashing(e.to_string()))
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
