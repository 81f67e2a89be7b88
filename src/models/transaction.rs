//! A transaction is a single dated income or expense record.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{DatabaseID, EntryType, UserID};

/// A single dated income or expense record owned by one user.
///
/// The amount is always stored as a non-negative number; whether it adds to
/// or subtracts from the balance is decided by `entry_type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    /// The transaction's ID.
    pub id: DatabaseID,
    /// The owning user.
    pub user_id: UserID,
    /// The category the transaction is filed under, if any.
    pub category_id: Option<DatabaseID>,
    /// The non-negative amount of money.
    pub amount: f64,
    /// Whether the transaction is income or an expense.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// A short description of the transaction.
    pub description: Option<String>,
    /// A free-form note.
    pub note: Option<String>,
    /// Whether the transaction recurs, e.g. a subscription.
    pub is_recurring: bool,
    /// The day the transaction happened.
    pub date: NaiveDate,
}
