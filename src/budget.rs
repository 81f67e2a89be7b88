//! Handlers for per-category monthly budgets.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::Claims,
    category::CATEGORIES,
    db::{Filter, MapRow, Table},
    models::{Budget, DatabaseID, EntryType, Month, UserID},
    user::USERS,
    AppConfig, Error,
};

/// The accessor for the `budgets` table.
pub(crate) const BUDGETS: Table<Budget> =
    Table::new("budgets", "id, user_id, category_id, month, amount");

#[derive(Debug, Deserialize)]
pub(crate) struct CreateBudgetRequest {
    category_id: Option<DatabaseID>,
    month: Option<String>,
    amount: Option<f64>,
}

/// Handler for creating a budget for the authenticated user.
///
/// At most one budget may exist per user, category, and month. The
/// existence pre-check gives the friendly 409 message; the unique
/// constraint on the table catches the race where two identical creates
/// interleave, so the second always fails regardless of timing.
///
/// # Errors
/// Returns a 400 when a field is missing or malformed, a 404 when the
/// user or category no longer exists, and a 409 for a duplicate budget.
pub async fn create(
    State(state): State<AppConfig>,
    claims: Claims,
    Json(payload): Json<CreateBudgetRequest>,
) -> Result<Response, Error> {
    let (Some(category_id), Some(month), Some(amount)) =
        (payload.category_id, payload.month, payload.amount)
    else {
        return Err(Error::Validation("Missing required fields.".to_string()));
    };

    let month = Month::new(&month)?;

    if !(amount >= 0.0 && amount.is_finite()) {
        return Err(Error::Validation(
            "Amount must be a positive number.".to_string(),
        ));
    }

    let connection = state.db_connection()?;

    USERS
        .find_one(&connection, &Filter::new().eq("id", claims.id))?
        .ok_or(Error::NotFound("User"))?;
    CATEGORIES
        .find_one(&connection, &Filter::new().eq("id", category_id))?
        .ok_or(Error::NotFound("Category"))?;

    let existing = BUDGETS.find_one(
        &connection,
        &Filter::new()
            .eq("user_id", claims.id)
            .eq("category_id", category_id)
            .eq("month", month.clone()),
    )?;
    if existing.is_some() {
        return Err(Error::DuplicateBudget);
    }

    let budget = BUDGETS.insert(
        &connection,
        &[
            ("user_id", &claims.id),
            ("category_id", &category_id),
            ("month", &month),
            ("amount", &amount),
        ],
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Budget created", "budget": budget })),
    )
        .into_response())
}

/// A budget joined with the name and type of its category.
#[derive(Debug, Serialize)]
pub struct BudgetWithCategory {
    /// The budget row.
    #[serde(flatten)]
    pub budget: Budget,
    /// The name of the budgeted category.
    pub category_name: String,
    /// Whether the budgeted category is income or expense.
    pub category_type: EntryType,
}

impl MapRow for BudgetWithCategory {
    type ReturnType = Self;

    fn map_row_with_offset(
        row: &rusqlite::Row,
        offset: usize,
    ) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            budget: Budget::map_row_with_offset(row, offset)?,
            category_name: row.get(offset + 5)?,
            category_type: row.get(offset + 6)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BudgetQuery {
    year: Option<i32>,
    month: Option<u32>,
}

/// The caller's budgets with category details, optionally for one month.
/// The category columns come from a single join rather than a per-budget
/// lookup.
fn find_with_categories(
    connection: &rusqlite::Connection,
    user_id: UserID,
    month: Option<Month>,
) -> Result<Vec<BudgetWithCategory>, Error> {
    let mut sql = "SELECT b.id, b.user_id, b.category_id, b.month, b.amount, c.name, c.type
        FROM budgets b
        INNER JOIN categories c ON c.id = b.category_id
        WHERE b.user_id = ?"
        .to_string();
    if month.is_some() {
        sql.push_str(" AND b.month = ?");
    }
    sql.push_str(" ORDER BY b.month ASC, c.name ASC");

    let mut statement = connection.prepare(&sql)?;

    let rows = match month {
        Some(month) => {
            statement.query_map(params![user_id, month], BudgetWithCategory::map_row)?
        }
        None => statement.query_map(params![user_id], BudgetWithCategory::map_row)?,
    };

    rows.map(|row| row.map_err(Error::from)).collect()
}

/// Handler for listing the authenticated user's budgets.
///
/// `year` and `month` narrow the list to one calendar month and must be
/// supplied together.
pub async fn get_all(
    State(state): State<AppConfig>,
    claims: Claims,
    Query(query): Query<BudgetQuery>,
) -> Result<Json<Vec<BudgetWithCategory>>, Error> {
    let month = match (query.year, query.month) {
        (Some(year), Some(month)) => Some(Month::from_parts(year, month).ok_or_else(|| {
            Error::Validation("Invalid month. Must be between 1 and 12.".to_string())
        })?),
        (None, None) => None,
        _ => {
            return Err(Error::Validation(
                "Both year and month are required to filter by month.".to_string(),
            ))
        }
    };

    let connection = state.db_connection()?;

    find_with_categories(&connection, claims.id, month).map(Json)
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateBudgetRequest {
    amount: Option<f64>,
}

/// Handler for changing the amount of one of the authenticated user's
/// budgets. The category and month of a budget are fixed at creation.
pub async fn update(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(id): Path<DatabaseID>,
    Json(payload): Json<UpdateBudgetRequest>,
) -> Result<Json<Budget>, Error> {
    let Some(amount) = payload.amount else {
        return Err(Error::Validation("Missing required fields.".to_string()));
    };
    if !(amount >= 0.0 && amount.is_finite()) {
        return Err(Error::Validation(
            "Amount must be a positive number.".to_string(),
        ));
    }

    let connection = state.db_connection()?;

    BUDGETS
        .update(
            &connection,
            &[("amount", &amount)],
            &Filter::new().eq("id", id).eq("user_id", claims.id),
        )
        .map(Json)
        .map_err(|error| match error {
            Error::NotFound(_) => Error::NotFound("Budget"),
            error => error,
        })
}

/// Handler for deleting one of the authenticated user's budgets.
pub async fn remove(
    State(state): State<AppConfig>,
    claims: Claims,
    Path(id): Path<DatabaseID>,
) -> Result<Json<serde_json::Value>, Error> {
    let connection = state.db_connection()?;

    BUDGETS
        .delete(
            &connection,
            &Filter::new().eq("id", id).eq("user_id", claims.id),
        )?
        .ok_or(Error::NotFound("Budget"))?;

    Ok(Json(json!({ "message": "Budget deleted successfully" })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{json, Value};

    use crate::{build_router, db::initialize, endpoints, AppConfig};

    fn test_server() -> TestServer {
        let connection = Connection::open_in_memory().expect("Could not open database in memory.");
        initialize(&connection).expect("Could not initialize database.");

        TestServer::new(build_router(AppConfig::new(connection, "foobar")))
            .expect("Could not create test server.")
    }

    async fn register_and_login(server: &TestServer, username: &str) -> (i64, String) {
        server
            .post(endpoints::REGISTER)
            .json(&json!({
                "username": username,
                "name": "Test User",
                "password": "averysecurepassword",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .post(endpoints::LOGIN)
            .json(&json!({
                "username": username,
                "password": "averysecurepassword",
            }))
            .await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        (
            body["user"]["id"].as_i64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    async fn create_category(server: &TestServer, name: &str) -> i64 {
        let response = server
            .post(endpoints::CREATE_CATEGORY)
            .json(&json!({ "name": name, "type": "expense" }))
            .await;

        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["category"]["id"].as_i64().unwrap()
    }

    async fn create_budget(
        server: &TestServer,
        token: &str,
        category_id: i64,
        month: &str,
        amount: f64,
    ) -> Value {
        let response = server
            .post(endpoints::CREATE_BUDGET)
            .authorization_bearer(token)
            .json(&json!({
                "category_id": category_id,
                "month": month,
                "amount": amount,
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["budget"].clone()
    }

    #[tokio::test]
    async fn create_fails_on_missing_fields_and_bad_month() {
        let server = test_server();
        let (_, token) = register_and_login(&server, "alice").await;
        let category_id = create_category(&server, "Food").await;

        server
            .post(endpoints::CREATE_BUDGET)
            .authorization_bearer(&token)
            .json(&json!({ "category_id": category_id }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post(endpoints::CREATE_BUDGET)
            .authorization_bearer(token)
            .json(&json!({
                "category_id": category_id,
                "month": "June 2025",
                "amount": 100.0,
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["message"],
            "Invalid month format. Use YYYY-MM format."
        );
    }

    #[tokio::test]
    async fn create_fails_on_negative_amount() {
        let server = test_server();
        let (_, token) = register_and_login(&server, "alice").await;
        let category_id = create_category(&server, "Food").await;

        let response = server
            .post(endpoints::CREATE_BUDGET)
            .authorization_bearer(token)
            .json(&json!({
                "category_id": category_id,
                "month": "2025-06",
                "amount": -1.0,
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["message"],
            "Amount must be a positive number."
        );
    }

    #[tokio::test]
    async fn create_fails_on_unknown_category() {
        let server = test_server();
        let (_, token) = register_and_login(&server, "alice").await;

        server
            .post(endpoints::CREATE_BUDGET)
            .authorization_bearer(token)
            .json(&json!({ "category_id": 999, "month": "2025-06", "amount": 100.0 }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_budget_for_same_month_conflicts() {
        let server = test_server();
        let (_, token) = register_and_login(&server, "alice").await;
        let category_id = create_category(&server, "Food").await;

        create_budget(&server, &token, category_id, "2025-06", 500.0).await;

        // Same category, different month is fine.
        create_budget(&server, &token, category_id, "2025-07", 500.0).await;

        let response = server
            .post(endpoints::CREATE_BUDGET)
            .authorization_bearer(token)
            .json(&json!({
                "category_id": category_id,
                "month": "2025-06",
                "amount": 250.0,
            }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(
            response.json::<Value>()["message"],
            "Budget already exists for this user, category, and month."
        );
    }

    #[tokio::test]
    async fn get_all_joins_category_details_and_filters_by_month() {
        let server = test_server();
        let (user_id, token) = register_and_login(&server, "alice").await;
        let food = create_category(&server, "Food").await;
        let rent = create_category(&server, "Rent").await;

        create_budget(&server, &token, food, "2025-06", 500.0).await;
        create_budget(&server, &token, rent, "2025-07", 900.0).await;

        let response = server
            .get(endpoints::BUDGETS)
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Vec<Value>>().len(), 2);

        let response = server
            .get(endpoints::BUDGETS)
            .authorization_bearer(token)
            .add_query_param("year", 2025)
            .add_query_param("month", 6)
            .await;
        response.assert_status_ok();

        let budgets = response.json::<Vec<Value>>();
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0]["user_id"].as_i64().unwrap(), user_id);
        assert_eq!(budgets[0]["month"], "2025-06");
        assert_eq!(budgets[0]["category_name"], "Food");
        assert_eq!(budgets[0]["category_type"], "expense");
    }

    #[tokio::test]
    async fn update_patches_amount_only() {
        let server = test_server();
        let (_, token) = register_and_login(&server, "alice").await;
        let category_id = create_category(&server, "Food").await;

        let budget = create_budget(&server, &token, category_id, "2025-06", 500.0).await;
        let id = budget["id"].as_i64().unwrap();

        let response = server
            .put(&endpoints::format_endpoint(endpoints::UPDATE_BUDGET, id))
            .authorization_bearer(token)
            .json(&json!({ "amount": 750.0 }))
            .await;

        response.assert_status_ok();
        let updated = response.json::<Value>();
        assert_eq!(updated["amount"], 750.0);
        assert_eq!(updated["month"], "2025-06");
        assert_eq!(updated["category_id"].as_i64().unwrap(), category_id);
    }

    #[tokio::test]
    async fn update_rejects_other_users_budget() {
        let server = test_server();
        let (_, alice_token) = register_and_login(&server, "alice").await;
        let (_, bob_token) = register_and_login(&server, "bob").await;
        let category_id = create_category(&server, "Food").await;

        let budget = create_budget(&server, &alice_token, category_id, "2025-06", 500.0).await;
        let id = budget["id"].as_i64().unwrap();

        server
            .put(&endpoints::format_endpoint(endpoints::UPDATE_BUDGET, id))
            .authorization_bearer(bob_token)
            .json(&json!({ "amount": 1.0 }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn remove_deletes_budget_then_404s() {
        let server = test_server();
        let (_, token) = register_and_login(&server, "alice").await;
        let category_id = create_category(&server, "Food").await;

        let budget = create_budget(&server, &token, category_id, "2025-06", 500.0).await;
        let id = budget["id"].as_i64().unwrap();

        let response = server
            .delete(&endpoints::format_endpoint(endpoints::REMOVE_BUDGET, id))
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>()["message"],
            "Budget deleted successfully"
        );

        server
            .delete(&endpoints::format_endpoint(endpoints::REMOVE_BUDGET, id))
            .authorization_bearer(token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
