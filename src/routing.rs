//! Application router configuration.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::{auth, budget, category, config::AppConfig, endpoints, report, transaction, user};

/// Return a router with all the app's routes.
///
/// CORS is wide open because the browser dashboard is served from a
/// different origin.
pub fn build_router(state: AppConfig) -> Router {
    Router::new()
        .route(endpoints::ROOT, get(get_index))
        .route(endpoints::LOGIN, post(auth::login))
        .route(endpoints::ME, get(auth::me))
        .route(endpoints::REGISTER, post(user::register))
        .route(endpoints::USERS, get(user::get_all))
        .route(endpoints::USER_BY_ID, get(user::get_by_id))
        .route(endpoints::UPDATE_USER, post(user::update))
        .route(endpoints::REMOVE_USER, post(user::remove))
        .route(endpoints::CREATE_CATEGORY, post(category::create))
        .route(endpoints::CATEGORIES, get(category::get_all))
        .route(endpoints::CATEGORY_BY_ID, get(category::get_by_id))
        .route(endpoints::UPDATE_CATEGORY, put(category::update))
        .route(endpoints::REMOVE_CATEGORY, delete(category::remove))
        .route(endpoints::CREATE_TRANSACTION, post(transaction::create))
        .route(endpoints::TRANSACTIONS, get(transaction::get_all))
        .route(endpoints::TRANSACTION_BY_ID, get(transaction::get_by_id))
        .route(endpoints::UPDATE_TRANSACTION, put(transaction::update))
        .route(endpoints::REMOVE_TRANSACTION, delete(transaction::remove))
        .route(
            endpoints::MONTHLY_SUMMARY,
            post(transaction::monthly_summary),
        )
        .route(endpoints::CREATE_BUDGET, post(budget::create))
        .route(endpoints::BUDGETS, get(budget::get_all))
        .route(endpoints::UPDATE_BUDGET, put(budget::update))
        .route(endpoints::REMOVE_BUDGET, delete(budget::remove))
        .route(endpoints::YEARLY_SUMMARY, get(report::yearly_summary))
        .route(
            endpoints::EXPENSE_BUDGET_SUMMARY,
            get(report::expense_budget_summary),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_index() -> &'static str {
    "Personal finance tracker API"
}
