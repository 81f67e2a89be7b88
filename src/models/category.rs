//! A category is a named income/expense bucket for transactions and budgets.

use serde::Serialize;

use crate::models::{DatabaseID, EntryType, UserID};

/// A named income/expense bucket.
///
/// A category with no `user_id` is global and visible to every user;
/// otherwise it is only visible to its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    /// The category's ID.
    pub id: DatabaseID,
    /// The owning user, or `None` for a global category.
    pub user_id: Option<UserID>,
    /// The display name.
    pub name: String,
    /// Whether the category buckets income or expenses.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
}
