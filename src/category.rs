//! Handlers for transaction categories.
//!
//! A category with no owner is global and visible to everyone; a category
//! with a `user_id` is private to that user. Every read and write in this
//! module is scoped by that visibility rule.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::OptionalClaims,
    db::{Filter, Table},
    models::{Category, DatabaseID, EntryType, UserID},
    user::USERS,
    AppConfig, Error,
};

/// The accessor for the `categories` table.
pub(crate) const CATEGORIES: Table<Category> = Table::new("categories", "id, user_id, name, type");

/// The rows of the categories table that the caller is allowed to see:
/// global categories plus their own, or global ones only when anonymous.
pub(crate) fn visible_to(claims: &OptionalClaims) -> Filter {
    match &claims.0 {
        Some(claims) => Filter::new().null_or_eq("user_id", claims.id),
        None => Filter::new().is_null("user_id"),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateCategoryRequest {
    user_id: Option<UserID>,
    name: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
}

/// Handler for creating a category.
///
/// Omitting `user_id` creates a global category.
///
/// # Errors
/// Returns a 400 when the name or type is missing or the type is not
/// `income`/`expense`, and a 404 when `user_id` does not refer to a user.
pub async fn create(
    State(state): State<AppConfig>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<Response, Error> {
    let (Some(name), Some(entry_type)) = (payload.name, payload.entry_type) else {
        return Err(Error::Validation("Missing required fields.".to_string()));
    };

    let entry_type = EntryType::from_name(&entry_type).ok_or_else(|| {
        Error::Validation("Invalid category type. Must be either income or expense.".to_string())
    })?;

    let connection = state.db_connection()?;

    if let Some(user_id) = payload.user_id {
        USERS
            .find_one(&connection, &Filter::new().eq("id", user_id))?
            .ok_or(Error::NotFound("User"))?;
    }

    let category = CATEGORIES.insert(
        &connection,
        &[
            ("user_id", &payload.user_id),
            ("name", &name),
            ("type", &entry_type),
        ],
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Category created", "category": category })),
    )
        .into_response())
}

/// Handler for listing the categories visible to the caller.
pub async fn get_all(
    State(state): State<AppConfig>,
    claims: OptionalClaims,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = state.db_connection()?;

    CATEGORIES
        .find(&connection, &visible_to(&claims).order_by("name ASC"))
        .map(Json)
}

/// Handler for fetching a single visible category.
pub async fn get_by_id(
    State(state): State<AppConfig>,
    claims: OptionalClaims,
    Path(id): Path<DatabaseID>,
) -> Result<Json<Category>, Error> {
    let connection = state.db_connection()?;

    CATEGORIES
        .find_one(&connection, &visible_to(&claims).eq("id", id))?
        .map(Json)
        .ok_or(Error::NotFound("Category"))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateCategoryRequest {
    name: Option<String>,
    #[serde(rename = "type")]
    entry_type: Option<String>,
}

/// Handler for updating a visible category. Omitted fields keep their
/// previous value.
pub async fn update(
    State(state): State<AppConfig>,
    claims: OptionalClaims,
    Path(id): Path<DatabaseID>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, Error> {
    let connection = state.db_connection()?;

    let category = CATEGORIES
        .find_one(&connection, &visible_to(&claims).eq("id", id))?
        .ok_or(Error::NotFound("Category"))?;

    let name = payload.name.unwrap_or(category.name);
    let entry_type = match payload.entry_type {
        Some(entry_type) => EntryType::from_name(&entry_type).ok_or_else(|| {
            Error::Validation(
                "Invalid category type. Must be either income or expense.".to_string(),
            )
        })?,
        None => category.entry_type,
    };

    CATEGORIES
        .update(
            &connection,
            &[("name", &name), ("type", &entry_type)],
            &Filter::new().eq("id", id),
        )
        .map(Json)
}

/// Handler for deleting a visible category.
///
/// Transactions that referenced the category keep existing with their
/// category cleared.
pub async fn remove(
    State(state): State<AppConfig>,
    claims: OptionalClaims,
    Path(id): Path<DatabaseID>,
) -> Result<Json<serde_json::Value>, Error> {
    let connection = state.db_connection()?;

    CATEGORIES
        .delete(&connection, &visible_to(&claims).eq("id", id))?
        .ok_or(Error::NotFound("Category"))?;

    Ok(Json(json!({ "message": "Category deleted successfully" })))
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

    /// Register a user and log them in, returning the user ID and a bearer
    /// token.
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

    async fn create_category(server: &TestServer, user_id: Option<i64>, name: &str) -> i64 {
        let response = server
            .post(endpoints::CREATE_CATEGORY)
            .json(&json!({
                "user_id": user_id,
                "name": name,
                "type": "expense",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()["category"]["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn create_fails_on_missing_fields() {
        let server = test_server();

        let response = server
            .post(endpoints::CREATE_CATEGORY)
            .json(&json!({ "name": "Food" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["message"],
            "Missing required fields."
        );
    }

    #[tokio::test]
    async fn create_fails_on_invalid_type() {
        let server = test_server();

        let response = server
            .post(endpoints::CREATE_CATEGORY)
            .json(&json!({ "name": "Food", "type": "savings" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json::<Value>()["message"],
            "Invalid category type. Must be either income or expense."
        );
    }

    #[tokio::test]
    async fn create_fails_on_unknown_user() {
        let server = test_server();

        server
            .post(endpoints::CREATE_CATEGORY)
            .json(&json!({ "user_id": 999, "name": "Food", "type": "expense" }))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn anonymous_caller_sees_only_global_categories() {
        let server = test_server();
        let (user_id, _) = register_and_login(&server, "alice").await;

        create_category(&server, None, "Global Food").await;
        create_category(&server, Some(user_id), "Alice Only").await;

        let response = server.get(endpoints::CATEGORIES).await;
        response.assert_status_ok();

        let categories = response.json::<Vec<Value>>();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0]["name"], "Global Food");
    }

    #[tokio::test]
    async fn authenticated_caller_sees_global_and_own_categories() {
        let server = test_server();
        let (alice_id, alice_token) = register_and_login(&server, "alice").await;
        let (bob_id, _) = register_and_login(&server, "bob").await;

        create_category(&server, None, "Global Food").await;
        create_category(&server, Some(alice_id), "Alice Only").await;
        create_category(&server, Some(bob_id), "Bob Only").await;

        let response = server
            .get(endpoints::CATEGORIES)
            .authorization_bearer(alice_token)
            .await;
        response.assert_status_ok();

        let names: Vec<String> = response
            .json::<Vec<Value>>()
            .iter()
            .map(|category| category["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Alice Only", "Global Food"]);
    }

    #[tokio::test]
    async fn get_by_id_hides_other_users_categories() {
        let server = test_server();
        let (alice_id, _) = register_and_login(&server, "alice").await;
        let (_, bob_token) = register_and_login(&server, "bob").await;

        let id = create_category(&server, Some(alice_id), "Alice Only").await;

        server
            .get(&endpoints::format_endpoint(endpoints::CATEGORY_BY_ID, id))
            .authorization_bearer(bob_token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_keeps_omitted_fields() {
        let server = test_server();
        let id = create_category(&server, None, "Food").await;

        let response = server
            .put(&endpoints::format_endpoint(endpoints::UPDATE_CATEGORY, id))
            .json(&json!({ "name": "Groceries" }))
            .await;

        response.assert_status_ok();
        let category = response.json::<Value>();
        assert_eq!(category["name"], "Groceries");
        assert_eq!(category["type"], "expense");
    }

    #[tokio::test]
    async fn remove_deletes_category_then_404s() {
        let server = test_server();
        let id = create_category(&server, None, "Food").await;

        let response = server
            .delete(&endpoints::format_endpoint(endpoints::REMOVE_CATEGORY, id))
            .await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<Value>()["message"],
            "Category deleted successfully"
        );

        server
            .delete(&endpoints::format_endpoint(endpoints::REMOVE_CATEGORY, id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
