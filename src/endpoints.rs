//! The API endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/user/get-by-id/:id', use
//! [format_endpoint].

/// The root route, for checking the server is up.
pub const ROOT: &str = "/";

/// The route for logging in a user.
pub const LOGIN: &str = "/auth/login";
/// The route for the authenticated user's own record.
pub const ME: &str = "/auth/me";

/// The route for registering a user.
pub const REGISTER: &str = "/user/register";
/// The route for listing all users.
pub const USERS: &str = "/user/get-all";
/// The route for fetching a user by ID.
pub const USER_BY_ID: &str = "/user/get-by-id/:id";
/// The route for updating a user.
pub const UPDATE_USER: &str = "/user/update-user/:id";
/// The route for deleting a user.
pub const REMOVE_USER: &str = "/user/remove-user/:id";

/// The route for creating a category.
pub const CREATE_CATEGORY: &str = "/categories/create";
/// The route for listing the categories visible to the caller.
pub const CATEGORIES: &str = "/categories/get-all";
/// The route for fetching a category by ID.
pub const CATEGORY_BY_ID: &str = "/categories/get-by-id/:id";
/// The route for updating a category.
pub const UPDATE_CATEGORY: &str = "/categories/update-category/:id";
/// The route for deleting a category.
pub const REMOVE_CATEGORY: &str = "/categories/remove-category/:id";

/// The route for recording a transaction.
pub const CREATE_TRANSACTION: &str = "/transactions/create";
/// The route for listing the caller's transactions.
pub const TRANSACTIONS: &str = "/transactions/get-all";
/// The route for fetching a transaction by ID.
pub const TRANSACTION_BY_ID: &str = "/transactions/get-by-id/:id";
/// The route for updating a transaction.
pub const UPDATE_TRANSACTION: &str = "/transactions/update-transaction/:id";
/// The route for deleting a transaction.
pub const REMOVE_TRANSACTION: &str = "/transactions/remove-transaction/:id";
/// The route for the caller's summary of one month.
pub const MONTHLY_SUMMARY: &str = "/transactions/get-user-monthly-summary";

/// The route for creating a budget.
pub const CREATE_BUDGET: &str = "/budgets/create";
/// The route for listing the caller's budgets.
pub const BUDGETS: &str = "/budgets/get-all";
/// The route for changing a budget's amount.
pub const UPDATE_BUDGET: &str = "/budgets/update-budget/:id";
/// The route for deleting a budget.
pub const REMOVE_BUDGET: &str = "/budgets/remove-budget/:id";

/// The route for the caller's month-by-month totals.
pub const YEARLY_SUMMARY: &str = "/reports/get-yearly-summary";
/// The route for the caller's budget-vs-actual report.
pub const EXPENSE_BUDGET_SUMMARY: &str = "/reports/get-expense-budget-summary";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is the trailing path segment starting with a colon, for
/// example ':id' in '/user/get-by-id/:id'. If `endpoint_path` has no
/// parameter, it is returned unchanged.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    match endpoint_path.find(':') {
        Some(param_start) => format!("{}{}", &endpoint_path[..param_start], id),
        None => endpoint_path.to_string(),
    }
}
