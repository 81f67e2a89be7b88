//! Handlers for income and expense transactions, including the per-month
//! summary used by the dashboard.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::Claims,
    category,
    db::{Filter, Table},
    models::{DatabaseID, EntryType, Month, Transaction, UserID},
    report::YEARLY_SUMMARY,
    AppConfig, Error,
};

/// The accessor for the `transactions` table.
pub(crate) const TRANSACTIONS: Table<Transaction> = Table::new(
    "transactions",
    "id, user_id, category_id, amount, type, description, note, is_recurring, date",
);

fn parse_entry_type(name: &str) -> Result<EntryType, Error> {
    EntryType::from_name(name).ok_or_else(|| {
        Error::Validation("Invalid transaction type. Must be either income or expense.".to_string())
    })
}

fn parse_date(value: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| Error::Validation("Invalid date format. Use YYYY-MM-DD format.".to_string()))
}

fn validate_amount(amount: f64) -> Result<f64, Error> {
    if amount > 0.0 && amount.is_finite() {
        Ok(amount)
    } else {
        Err(Error::Validation(
            "Amount must be a positive number.".to_string(),
        ))
    }
}

/// Check that `category_id` refers to a category the user may record
/// against, that is a global category or one of their own.
fn check_category_visible(
    connection: &rusqlite::Connection,
    category_id: DatabaseID,
    user_id: UserID,
) -> Result<(), Error> {
    category::CATEGORIES
        .find_one(
            connection,
            &Filter::new().eq("id", category_id).null_or_eq("user_id", user_id),
        )?
        .map(|_| ())
        .ok_or(Error::NotFound("Category"))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateTransactionRequest {
    category_id: Option<DatabaseID>,
    amount: Option<f64>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    description: Option<String>,
    note: Option<String>,
    is_recurring: Option<bool>,
    date: Option<String>,
}

/// Handler for recording a transaction for the authenticated user.
///
/// # Errors
/// Returns a 400 when the amount, type, or date is missing or malformed,
/// and a 404 when `category_id` is not visible to the user.
pub async fn create(
    State(state): State<AppConfig>,
    claims: Claims,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<Response, Error> {
    let (Some(amount), Some(entry_type), Some(date)) =
        (payload.amount, payload.entry_type, payload.date)
    else {
        return Err(Error::Validation("Missing required fields.".to_string()));
    };

    let amount = validate_amount(amount)?;
    let entry_type = parse_entry_type(&entry_type)?;
    let date = parse_date(&date)?;
    let is_recurring = payload.is_recurring.unwrap_or(false);

    let connection = state.db_connection()?;

    if let Some(category_id) = payload.category_id {
        check_category_visible(&connection, category_id, claims.id)?;
    }

    let transaction = TRANSACTIONS.insert(
        &connection,
        &[
            ("user_id", &claims.id),
            ("category_id", &payload.category_id),
            ("amount", &amount),
            ("type", &entry_type),
            ("description", &payload.description),
            ("note", &payload.note),
            ("is_recurring", &is_recurring),
            ("date", &date),
        ],
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Transaction created", "transaction": transaction })),
    )
        .into_response())
}

/// The month a list request is scoped to, sent as a JSON-encoded `search`
/// query parameter.
#[derive(Debug, Deserialize)]
struct SearchPeriod {
    month: u32,
    year: i32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TransactionQuery {
    start_date: Option<String>,
    end_date: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    category_id: Option<DatabaseID>,
    search: Option<String>,
}

/// Handler for listing the authenticated user's transactions, newest first.
///
/// Optional query parameters narrow the list: `start_date`/`end_date` bound
/// the date range, `type` and `category_id` match exactly, and `search` is a
/// JSON object `{"month": m, "year": y}` that selects one calendar month.
pub async fn get_all(
    State(state): State<AppConfig>,
    claims: Claims,
    Query(query): Query<TransactionQuery>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let mut filter = Filter::new().eq("user_id", claims.id);

    if let Some(start_date) = query.start_date {
        filter = filter.at_least("date", parse_date(&start_date)?);
    }
    if let Some(end_date) = query.end_date {
        filter = filter.at_most("date", parse_date(&end_date)?);
    }
    if let Some(entry_type) = query.entry_type {
        filter = filter.eq("type", parse_entry_type(&entry_type)?);
    }
    if let Some(category_id) = query.category_id {
        filter = filter.eq("category_id", category_id);
    }
    if let Some(search) = query.search {
        let period: SearchPeriod = serde_json::from_str(&search)
            .map_err(|_| Error::Validation("Invalid search filter.".to_string()))?;
        let (first, last) = month_bounds(period.year, period.month)
            .ok_or_else(|| Error::Validation("Invalid search filter.".to_string()))?;

        filter = filter.at_least("date", first).at_most("date", last);
    }

    let connection = state.db_connection()?;

    TRANSACTIONS
        .find(&connection, &filter.order_by("date DESC, id DESC"))
        .map(Json)
}

/// Handler for fetching one of the authenticated user's transactions.
pub async fn get_by_id(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(id): Path<DatabaseID>,
) -> Result<Json<Transaction>, Error> {
    let connection = state.db_connection()?;

    TRANSACTIONS
        .find_one(
            &connection,
            &Filter::new().eq("id", id).eq("user_id", claims.id),
        )?
        .map(Json)
        .ok_or(Error::NotFound("Transaction"))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateTransactionRequest {
    category_id: Option<DatabaseID>,
    amount: Option<f64>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
    description: Option<String>,
    note: Option<String>,
    is_recurring: Option<bool>,
    date: Option<String>,
}

/// Handler for updating one of the authenticated user's transactions.
/// Omitted fields keep their previous value; supplied fields are validated
/// the same way as on create.
pub async fn update(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(id): Path<DatabaseID>,
    Json(payload): Json<UpdateTransactionRequest>,
) -> Result<Json<Transaction>, Error> {
    let connection = state.db_connection()?;

    let transaction = TRANSACTIONS
        .find_one(
            &connection,
            &Filter::new().eq("id", id).eq("user_id", claims.id),
        )?
        .ok_or(Error::NotFound("Transaction"))?;

    let amount = match payload.amount {
        Some(amount) => validate_amount(amount)?,
        None => transaction.amount,
    };
    let entry_type = match payload.entry_type {
        Some(entry_type) => parse_entry_type(&entry_type)?,
        None => transaction.entry_type,
    };
    let date = match payload.date {
        Some(date) => parse_date(&date)?,
        None => transaction.date,
    };
    let category_id = match payload.category_id {
        Some(category_id) => {
            check_category_visible(&connection, category_id, claims.id)?;
            Some(category_id)
        }
        None => transaction.category_id,
    };
    let description = payload.description.or(transaction.description);
    let note = payload.note.or(transaction.note);
    let is_recurring = payload.is_recurring.unwrap_or(transaction.is_recurring);

    TRANSACTIONS
        .update(
            &connection,
            &[
                ("category_id", &category_id),
                ("amount", &amount),
                ("type", &entry_type),
                ("description", &description),
                ("note", &note),
                ("is_recurring", &is_recurring),
                ("date", &date),
            ],
            &Filter::new().eq("id", id).eq("user_id", claims.id),
        )
        .map(Json)
        // The row can vanish between the ownership check and the UPDATE.
        .map_err(|error| match error {
            Error::NotFound(_) => Error::NotFound("Transaction"),
            error => error,
        })
}

/// Handler for deleting one of the authenticated user's transactions.
pub async fn remove(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(id): Path<DatabaseID>,
) -> Result<Json<serde_json::Value>, Error> {
    let connection = state.db_connection()?;

    TRANSACTIONS
        .delete(
            &connection,
            &Filter::new().eq("id", id).eq("user_id", claims.id),
        )?
        .ok_or(Error::NotFound("Transaction"))?;

    Ok(Json(json!({ "message": "Transaction deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct MonthlySummaryRequest {
    month: Option<u32>,
    year: Option<i32>,
}

/// The dashboard summary for one calendar month.
#[derive(Debug, Serialize)]
pub struct MonthlySummary {
    /// The user the summary belongs to.
    pub user_id: UserID,
    /// The calendar month (1 to 12).
    pub month: u32,
    /// The calendar year.
    pub year: i32,
    /// The sum of income transactions in the month.
    pub total_income: f64,
    /// The sum of expense transactions in the month.
    pub total_expense: f64,
    /// `total_income - total_expense`.
    pub balance: f64,
    /// The number of days in the month.
    pub total_days_in_month: u32,
    /// The day of the month reached so far. The full month for past months,
    /// zero for future months.
    pub today: u32,
    /// The days remaining including today. Zero for past months, the full
    /// month for future months.
    pub days_left: u32,
    /// The budget left for the month spread over the remaining days, or zero
    /// when no days remain.
    pub avg_daily_budget_left: f64,
}

/// The first and last day of the given calendar month.
fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;

    Some((first, last))
}

/// Handler for the authenticated user's summary of one month.
///
/// Totals come from the `user_yearly_summary` view; the day arithmetic uses
/// the current UTC date.
pub async fn monthly_summary(
    State(state): State<AppConfig>,
    claims: Claims,
    Json(payload): Json<MonthlySummaryRequest>,
) -> Result<Json<MonthlySummary>, Error> {
    let (Some(month), Some(year)) = (payload.month, payload.year) else {
        return Err(Error::Validation("Missing required fields.".to_string()));
    };

    let (first, last) = month_bounds(year, month)
        .ok_or_else(|| Error::Validation("Invalid month. Must be between 1 and 12.".to_string()))?;
    let total_days_in_month = last.day();

    let connection = state.db_connection()?;

    let totals = YEARLY_SUMMARY.find_one(
        &connection,
        &Filter::new()
            .eq("user_id", claims.id)
            .eq("year", year)
            .eq("month", month),
    )?;
    let (total_income, total_expense) = totals
        .map(|row| (row.total_income, row.total_expense))
        .unwrap_or((0.0, 0.0));

    let month_key = Month::from_parts(year, month)
        .ok_or_else(|| Error::Validation("Invalid month. Must be between 1 and 12.".to_string()))?;
    let total_budget: f64 = connection.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM budgets WHERE user_id = ? AND month = ?",
        rusqlite::params![claims.id, month_key],
        |row| row.get(0),
    )?;

    let now = Utc::now().date_naive();
    let (today, days_left) = if (year, month) == (now.year(), now.month()) {
        (now.day(), total_days_in_month - now.day() + 1)
    } else if first < now {
        (total_days_in_month, 0)
    } else {
        (0, total_days_in_month)
    };

    let avg_daily_budget_left = if days_left > 0 {
        (total_budget - total_expense) / f64::from(days_left)
    } else {
        0.0
    };

    Ok(Json(MonthlySummary {
        user_id: claims.id,
        month,
        year,
        total_income,
        total_expense,
        balance: total_income - total_expense,
        total_days_in_month,
        today,
        days_left,
        avg_daily_budget_left,
    }))
}
