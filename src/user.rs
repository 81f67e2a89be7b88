//! Handlers for registering and managing users.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    db::{Filter, Table},
    models::{DatabaseID, PasswordHash, RawPassword, User},
    AppConfig, Error,
};

/// The accessor for the `users` table.
pub(crate) const USERS: Table<User> = Table::new(
    "users",
    "id, username, name, password_hash, provider_type, provider_user_id, avatar_url",
);

#[derive(Debug, Deserialize)]
pub(crate) struct RegisterRequest {
    username: Option<String>,
    name: Option<String>,
    password: Option<String>,
    provider_type: Option<String>,
}

/// Handler for registering a new user.
///
/// The username is folded to lowercase before the uniqueness check and
/// storage, so the same name in a different case still conflicts.
///
/// # Errors
/// Returns a 400 when a required field is missing or the password is too
/// short, and a 409 when the username is already taken.
pub async fn register(
    State(state): State<AppConfig>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, Error> {
    let (Some(username), Some(name), Some(password)) =
        (payload.username, payload.name, payload.password)
    else {
        return Err(Error::Validation("Missing required fields.".to_string()));
    };

    let username = username.to_lowercase();
    let password_hash = PasswordHash::new(&RawPassword::new(password)?)?;
    let provider_type = payload.provider_type.unwrap_or_else(|| "local".to_string());

    let connection = state.db_connection()?;

    let existing = USERS.find_one(
        &connection,
        &Filter::new().eq("username", username.clone()),
    )?;
    if existing.is_some() {
        return Err(Error::DuplicateUsername);
    }

    // The unique index on username backstops the check above.
    let user = USERS.insert(
        &connection,
        &[
            ("username", &username),
            ("name", &name),
            ("password_hash", &password_hash),
            ("provider_type", &provider_type),
            ("provider_user_id", &""),
            ("avatar_url", &""),
        ],
    )?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created", "user": user })),
    )
        .into_response())
}

/// Handler for listing all users.
pub async fn get_all(State(state): State<AppConfig>) -> Result<Json<Vec<User>>, Error> {
    let connection = state.db_connection()?;

    USERS.find(&connection, &Filter::new()).map(Json)
}

/// Handler for fetching a single user by ID.
pub async fn get_by_id(
    State(state): State<AppConfig>,
    Path(id): Path<DatabaseID>,
) -> Result<Json<User>, Error> {
    let connection = state.db_connection()?;

    USERS
        .find_one(&connection, &Filter::new().eq("id", id))?
        .map(Json)
        .ok_or(Error::NotFound("User"))
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateUserRequest {
    username: Option<String>,
    name: Option<String>,
    password: Option<String>,
}

/// Handler for updating a user's profile.
///
/// Fields omitted from the payload keep their previous value; a new
/// password is validated and re-hashed.
pub async fn update(
    State(state): State<AppConfig>,
    Path(id): Path<DatabaseID>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, Error> {
    let connection = state.db_connection()?;

    let user = USERS
        .find_one(&connection, &Filter::new().eq("id", id))?
        .ok_or(Error::NotFound("User"))?;

    let username = match payload.username {
        Some(username) => username.to_lowercase(),
        None => user.username,
    };
    let name = payload.name.unwrap_or(user.name);
    let password_hash = match payload.password {
        Some(password) => PasswordHash::new(&RawPassword::new(password)?)?,
        None => user.password_hash,
    };

    USERS
        .update(
            &connection,
            &[
                ("username", &username),
                ("name", &name),
                ("password_hash", &password_hash),
            ],
            &Filter::new().eq("id", id),
        )
        .map(Json)
}

/// Handler for deleting a user.
pub async fn remove(
    State(state): State<AppConfig>,
    Path(id): Path<DatabaseID>,
) -> Result<Json<serde_json::Value>, Error> {
    let connection = state.db_connection()?;

    let user = USERS
        .delete(&connection, &Filter::new().eq("id", id))?
        .ok_or(Error::NotFound("User"))?;

    Ok(Json(json!({ "message": "User deleted", "user": user })))
}
