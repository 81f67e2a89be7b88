//! Coinkeeper is a personal finance tracker backend.
//!
//! Users register and log in, record income/expense transactions against
//! categories, set monthly budgets per category, and read aggregated reports
//! (monthly summary, yearly summary, budget-vs-actual). This library
//! provides the JSON REST API over a SQLite database.

#![warn(missing_docs)]

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

pub mod auth;
pub mod budget;
pub mod category;
mod config;
pub mod db;
pub mod endpoints;
pub mod models;
pub mod report;
mod routing;
pub mod transaction;
pub mod user;

pub use config::AppConfig;
pub use db::initialize as initialize_db;
pub use routing::build_router;

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first, and then signals the server to shut down
/// gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
///
/// Every variant maps to one HTTP status; handlers return these and the
/// [IntoResponse] impl translates them into a JSON `{"message": ...}` body.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The request was missing a field or carried a malformed value. The
    /// message is safe to show to the client.
    #[error("{0}")]
    Validation(String),

    /// The named resource does not exist or is not visible to the caller.
    #[error("{0} not found.")]
    NotFound(&'static str),

    /// The login credentials did not match a registered user.
    #[error("Invalid username or password.")]
    InvalidCredentials,

    /// The bearer token was missing, malformed, or expired.
    #[error("Invalid or missing token.")]
    InvalidToken,

    /// The username is already taken (case-insensitive).
    #[error("Username already exists.")]
    DuplicateUsername,

    /// A budget already exists for the same user, category, and month.
    #[error("Budget already exists for this user, category, and month.")]
    DuplicateBudget,

    /// A query referenced a row that does not exist.
    #[error("Invalid reference to a related record.")]
    InvalidForeignKey,

    /// Signing a JWT failed.
    #[error("Token creation failed.")]
    TokenCreation,

    /// The password hashing library failed. The message should only be
    /// logged on the server.
    #[error("Hashing failed: {0}")]
    Hashing(String),

    /// The database lock was poisoned.
    #[error("Could not acquire the database lock.")]
    DatabaseLock,

    /// An unhandled/unexpected SQL error.
    #[error("An unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(error: rusqlite::Error) -> Self {
        match error {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("users.username") =>
            {
                Error::DuplicateUsername
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.contains("budgets") =>
            {
                Error::DuplicateBudget
            }
            // Code 787 occurs when a FOREIGN KEY constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(_))
                if sql_error.extended_code == 787 =>
            {
                Error::InvalidForeignKey
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound("Record"),
            error => Error::SqlError(error),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::Validation(_) | Error::InvalidForeignKey => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidCredentials | Error::InvalidToken => StatusCode::UNAUTHORIZED,
            Error::DuplicateUsername | Error::DuplicateBudget => StatusCode::CONFLICT,
            Error::TokenCreation
            | Error::Hashing(_)
            | Error::DatabaseLock
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal details are logged server-side only; the client gets a
        // generic message.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::Error;

    #[test]
    fn validation_maps_to_bad_request() {
        let response = Error::Validation("Missing required fields.".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let response = Error::NotFound("Transaction").into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn auth_errors_map_to_401() {
        assert_eq!(
            Error::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn duplicates_map_to_conflict() {
        assert_eq!(
            Error::DuplicateUsername.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::DuplicateBudget.into_response().status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn sql_error_is_hidden_behind_500() {
        let response = Error::SqlError(rusqlite::Error::InvalidQuery).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
