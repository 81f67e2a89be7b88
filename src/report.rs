//! Read-only reporting handlers backed by the SQL views.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::Claims,
    db::{Filter, MapRow, Table},
    models::{DatabaseID, Month, UserID},
    AppConfig, Error,
};

/// One row of the `user_yearly_summary` view: a user's totals for one
/// calendar month. Months without transactions have no row.
#[derive(Debug, Serialize)]
pub struct YearlySummaryRow {
    /// The user the totals belong to.
    pub user_id: UserID,
    /// The calendar year.
    pub year: i32,
    /// The calendar month (1 to 12).
    pub month: u32,
    /// The sum of income transactions in the month.
    pub total_income: f64,
    /// The sum of expense transactions in the month.
    pub total_expense: f64,
}

impl MapRow for YearlySummaryRow {
    type ReturnType = Self;

    fn map_row_with_offset(row: &rusqlite::Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            user_id: row.get(offset)?,
            year: row.get(offset + 1)?,
            month: row.get(offset + 2)?,
            total_income: row.get(offset + 3)?,
            total_expense: row.get(offset + 4)?,
        })
    }
}

/// The accessor for the `user_yearly_summary` view.
pub(crate) const YEARLY_SUMMARY: Table<YearlySummaryRow> = Table::new(
    "user_yearly_summary",
    "user_id, year, month, total_income, total_expense",
);

/// One row of the `expense_budget_summary` view: a budget compared against
/// the actual expenses of its category and month.
#[derive(Debug, Serialize)]
pub struct ExpenseBudgetRow {
    /// The user the budget belongs to.
    pub user_id: UserID,
    /// The budgeted category.
    pub category_id: DatabaseID,
    /// The name of the budgeted category.
    pub category_name: String,
    /// The budgeted month.
    pub month: Month,
    /// The expenses recorded against the category in the month.
    pub total_expense: f64,
    /// The budgeted amount.
    pub budget_amount: f64,
    /// `total_expense - budget_amount`; negative while under budget.
    pub over_budget: f64,
    /// Whether spending exceeded the budget.
    pub is_over_budget: bool,
}

impl MapRow for ExpenseBudgetRow {
    type ReturnType = Self;

    fn map_row_with_offset(row: &rusqlite::Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            user_id: row.get(offset)?,
            category_id: row.get(offset + 1)?,
            category_name: row.get(offset + 2)?,
            month: row.get(offset + 3)?,
            total_expense: row.get(offset + 4)?,
            budget_amount: row.get(offset + 5)?,
            over_budget: row.get(offset + 6)?,
            is_over_budget: row.get(offset + 7)?,
        })
    }
}

/// The accessor for the `expense_budget_summary` view.
pub(crate) const EXPENSE_BUDGET_SUMMARY: Table<ExpenseBudgetRow> = Table::new(
    "expense_budget_summary",
    "user_id, category_id, category_name, month, total_expense, budget_amount, over_budget, is_over_budget",
);

#[derive(Debug, Deserialize)]
pub(crate) struct YearQuery {
    year: Option<i32>,
}

/// Handler for the authenticated user's month-by-month totals.
///
/// Returns one row per month that has transactions, oldest first; `year`
/// narrows the report to one calendar year.
pub async fn yearly_summary(
    State(state): State<AppConfig>,
    claims: Claims,
    Query(query): Query<YearQuery>,
) -> Result<Json<Vec<YearlySummaryRow>>, Error> {
    let mut filter = Filter::new().eq("user_id", claims.id);
    if let Some(year) = query.year {
        filter = filter.eq("year", year);
    }

    let connection = state.db_connection()?;

    YEARLY_SUMMARY
        .find(&connection, &filter.order_by("year ASC, month ASC"))
        .map(Json)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExpenseBudgetQuery {
    year: Option<i32>,
    month: Option<u32>,
}

/// Handler for the authenticated user's budget-vs-actual report for one
/// month.
pub async fn expense_budget_summary(
    State(state): State<AppConfig>,
    claims: Claims,
    Query(query): Query<ExpenseBudgetQuery>,
) -> Result<Json<Vec<ExpenseBudgetRow>>, Error> {
    let (Some(year), Some(month)) = (query.year, query.month) else {
        return Err(Error::Validation("Missing required fields.".to_string()));
    };
    let month = Month::from_parts(year, month)
        .ok_or_else(|| Error::Validation("Invalid month. Must be between 1 and 12.".to_string()))?;

    let connection = state.db_connection()?;

    EXPENSE_BUDGET_SUMMARY
        .find(
            &connection,
            &Filter::new()
                .eq("user_id", claims.id)
                .eq("month", month)
                .order_by("category_name ASC"),
        )
        .map(Json)
}
