//! A budget is a user-set spending ceiling for one category in one month.

use std::fmt::Display;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

use crate::{
    models::{DatabaseID, UserID},
    Error,
};

/// A calendar month key in `YYYY-MM` format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Month(String);

impl Month {
    /// Parse and validate a `YYYY-MM` month key.
    ///
    /// # Errors
    /// Returns [Error::Validation] if `value` does not match `YYYY-MM` or
    /// the month part is not in 01-12.
    pub fn new(value: &str) -> Result<Self, Error> {
        let bytes = value.as_bytes();
        let well_formed = bytes.len() == 7
            && bytes[..4].iter().all(|byte| byte.is_ascii_digit())
            && bytes[4] == b'-'
            && bytes[5..].iter().all(|byte| byte.is_ascii_digit());

        let month_in_range =
            well_formed && matches!(value[5..].parse::<u32>(), Ok(month) if (1..=12).contains(&month));

        if month_in_range {
            Ok(Self(value.to_string()))
        } else {
            Err(Error::Validation(
                "Invalid month format. Use YYYY-MM format.".to_string(),
            ))
        }
    }

    /// Build a month key from numeric year and month parts.
    ///
    /// Returns `None` if `month` is not in 1-12.
    pub fn from_parts(year: i32, month: u32) -> Option<Self> {
        if (1..=12).contains(&month) {
            Some(Self(format!("{year:04}-{month:02}")))
        } else {
            None
        }
    }

    /// The `YYYY-MM` string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for Month {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_str()))
    }
}

impl FromSql for Month {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        // Month strings coming out of the database were validated on the way in.
        String::column_result(value).map(Month)
    }
}

/// A spending ceiling for one category in one month.
///
/// At most one budget exists per (user, category, month); the database
/// enforces this with a unique constraint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Budget {
    /// The budget's ID.
    pub id: DatabaseID,
    /// The owning user.
    pub user_id: UserID,
    /// The category the ceiling applies to.
    pub category_id: DatabaseID,
    /// The month the ceiling applies to.
    pub month: Month,
    /// The non-negative ceiling amount.
    pub amount: f64,
}
