//! A user of the application and its ID type.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::models::PasswordHash;

/// The ID of a [User].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// The integer form of the ID, e.g. for SQL parameters.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for UserID {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for UserID {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(UserID)
    }
}

/// A registered user.
///
/// The password hash is never serialized, so handlers can return this type
/// directly in JSON responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    /// The user's ID.
    pub id: UserID,
    /// The unique login name, stored lowercase.
    pub username: String,
    /// The user's display name.
    pub name: String,
    /// The bcrypt hash of the user's password.
    #[serde(skip_serializing)]
    pub password_hash: PasswordHash,
    /// How the account was created, e.g. `"local"`.
    pub provider_type: Option<String>,
    /// The account ID at the external provider, if any.
    pub provider_user_id: Option<String>,
    /// URL of the user's avatar image.
    pub avatar_url: Option<String>,
}
