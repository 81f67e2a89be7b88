//! The domain models persisted by the application.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

mod budget;
mod category;
mod password;
mod transaction;
mod user;

pub use budget::{Budget, Month};
pub use category::Category;
pub use password::{PasswordHash, RawPassword};
pub use transaction::Transaction;
pub use user::{User, UserID};

/// Alias for the integer type used for database row IDs.
pub type DatabaseID = i64;

/// The direction of a money flow.
///
/// Both categories and transactions are classified as either income or
/// expense. Amounts are always stored positive; the sign is implied by this
/// type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Money coming in.
    Income,
    /// Money going out.
    Expense,
}

impl EntryType {
    /// Parse an entry type from its wire/database name.
    ///
    /// Returns `None` for anything other than `"income"` or `"expense"` so
    /// that callers can attach their own validation error.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "income" => Some(Self::Income),
            "expense" => Some(Self::Expense),
            _ => None,
        }
    }

    /// The name stored in the database and used in JSON bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ToSql for EntryType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for EntryType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let name = value.as_str()?;

        Self::from_name(name)
            .ok_or_else(|| FromSqlError::Other(format!("invalid entry type: {name}").into()))
    }
}
