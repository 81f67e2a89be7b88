//! Password validation and hashing.

use std::fmt::Display;

use bcrypt::{hash, verify, DEFAULT_COST};
use rusqlite::types::{ToSql, ToSqlOutput};
use serde::Deserialize;

use crate::Error;

/// The minimum number of characters a password must have.
const MIN_PASSWORD_LENGTH: usize = 8;

/// A password that has been validated, but not yet hashed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawPassword(String);

impl RawPassword {
    /// Create a new password from a string.
    ///
    /// # Errors
    /// Returns [Error::Validation] if the password is shorter than
    /// [MIN_PASSWORD_LENGTH] characters.
    pub fn new(raw_password: String) -> Result<Self, Error> {
        if raw_password.chars().count() < MIN_PASSWORD_LENGTH {
            Err(Error::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters long."
            )))
        } else {
            Ok(Self(raw_password))
        }
    }

    /// Create a new `RawPassword` without any validation.
    ///
    /// This should only be used in tests where the validation rules do not
    /// matter.
    pub fn new_unchecked(raw_password: String) -> Self {
        Self(raw_password)
    }
}

impl AsRef<str> for RawPassword {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<[u8]> for RawPassword {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// A bcrypt hash of a user's password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash a validated password.
    ///
    /// # Errors
    /// Returns [Error::Hashing] if the underlying hashing library fails.
    pub fn new(raw_password: &RawPassword) -> Result<Self, Error> {
        hash(raw_password, DEFAULT_COST)
            .map(Self)
            .map_err(|error| Error::Hashing(error.to_string()))
    }

    /// Create a `PasswordHash` from a string that is already a valid hash.
    ///
    /// This should only be called on strings coming out of a trusted source
    /// such as the application's database.
    pub fn new_unchecked(raw_password_hash: String) -> Self {
        Self(raw_password_hash)
    }

    /// Check that `raw_password` matches the stored password.
    ///
    /// # Errors
    /// Returns [Error::Hashing] if the stored hash could not be parsed.
    pub fn verify(&self, raw_password: &RawPassword) -> Result<bool, Error> {
        verify(raw_password, &self.0).map_err(|error| Error::Hashing(error.to_string()))
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl ToSql for PasswordHash {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}
