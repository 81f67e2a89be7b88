//! Database bootstrap and the generic table accessor.
//!
//! Each domain controller talks to its table through a [Table], which
//! provides parameterized insert/find/find_one/update/delete so that SQL
//! boilerplate is not restated per controller. Predicates are composed with
//! [Filter]; caller-supplied values are always bound as parameters, never
//! interpolated into the query text.

use std::marker::PhantomData;

use rusqlite::{
    params_from_iter, types::ToSql, Connection, OptionalExtension, Row,
    Transaction as SqlTransaction,
};

use crate::{
    models::{Budget, Category, PasswordHash, Transaction, User},
    Error,
};

/// A trait for adding a model's schema to the database.
pub trait CreateTable {
    /// Create the table (and any related indices) for the model if it does
    /// not exist yet.
    ///
    /// # Errors
    /// Returns an error if there is an SQL error.
    fn create_table(connection: &Connection) -> Result<(), Error>;
}

/// A trait for mapping a `rusqlite::Row` to a concrete rust type.
pub trait MapRow {
    type ReturnType;

    /// Convert a row into a concrete type.
    ///
    /// **Note:** This function expects the row to contain all the table
    /// columns in the order they were defined.
    ///
    /// # Errors
    /// Returns an error if a row item cannot be converted into the
    /// corresponding rust type, or if an invalid column index was used.
    fn map_row(row: &Row) -> Result<Self::ReturnType, rusqlite::Error> {
        Self::map_row_with_offset(row, 0)
    }

    /// Convert a row into a concrete type, reading from column `offset`.
    ///
    /// Useful when tables have been joined and two types need to be
    /// constructed from the one query.
    ///
    /// # Errors
    /// Returns an error if a row item cannot be converted into the
    /// corresponding rust type, or if an invalid column index was used.
    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self::ReturnType, rusqlite::Error>;
}

/// A composable, fully parameterized WHERE/ORDER BY clause.
///
/// Column names are `&'static str` supplied by controllers; values are kept
/// separate and bound positionally when the query runs. There is no way to
/// splice a request value into the SQL text through this type.
#[derive(Default)]
pub struct Filter {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
    order: Option<&'static str>,
}

impl Filter {
    /// An empty filter that matches every row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `column = value`.
    pub fn eq(self, column: &'static str, value: impl ToSql + 'static) -> Self {
        self.compare(column, "=", value)
    }

    /// Require `column >= value`.
    pub fn at_least(self, column: &'static str, value: impl ToSql + 'static) -> Self {
        self.compare(column, ">=", value)
    }

    /// Require `column <= value`.
    pub fn at_most(self, column: &'static str, value: impl ToSql + 'static) -> Self {
        self.compare(column, "<=", value)
    }

    /// Require `column IS NULL`.
    pub fn is_null(mut self, column: &'static str) -> Self {
        self.clauses.push(format!("{column} IS NULL"));
        self
    }

    /// Require `column IS NULL OR column = value`.
    ///
    /// Used for rows that are either shared (no owner) or owned by the
    /// caller, such as global categories.
    pub fn null_or_eq(mut self, column: &'static str, value: impl ToSql + 'static) -> Self {
        self.clauses
            .push(format!("({column} IS NULL OR {column} = ?)"));
        self.params.push(Box::new(value));
        self
    }

    /// Append an ORDER BY clause.
    ///
    /// The accessor itself guarantees no ordering; controllers that need one
    /// must supply it here.
    pub fn order_by(mut self, clause: &'static str) -> Self {
        self.order = Some(clause);
        self
    }

    fn compare(mut self, column: &'static str, operator: &str, value: impl ToSql + 'static) -> Self {
        self.clauses.push(format!("{column} {operator} ?"));
        self.params.push(Box::new(value));
        self
    }

    fn render(&self) -> String {
        let mut sql = String::new();

        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }

        if let Some(order) = self.order {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }

        sql
    }

    fn params(&self) -> impl Iterator<Item = &dyn ToSql> {
        self.params.iter().map(|param| param.as_ref())
    }
}

/// A set of column-value pairs for an INSERT or an UPDATE SET list.
///
/// Column names come from controller code; values are bound as parameters.
pub type ColumnValues<'a> = [(&'static str, &'a dyn ToSql)];

/// A thin per-table data-access object.
///
/// `columns` is the full column list of the table in the order expected by
/// the model's [MapRow] implementation; it is used for both SELECT and
/// RETURNING clauses so every operation yields complete rows.
pub struct Table<M> {
    name: &'static str,
    columns: &'static str,
    row_type: PhantomData<M>,
}

impl<M> Table<M>
where
    M: MapRow<ReturnType = M>,
{
    /// Create an accessor for the table `name` with the given column list.
    pub const fn new(name: &'static str, columns: &'static str) -> Self {
        Self {
            name,
            columns,
            row_type: PhantomData,
        }
    }

    /// Insert a row and return it as stored, including the generated ID and
    /// column defaults.
    ///
    /// # Errors
    /// Returns an error if a constraint was violated or the statement
    /// failed; unique and foreign key violations are mapped to their
    /// specific [Error] variants.
    pub fn insert(&self, connection: &Connection, values: &ColumnValues) -> Result<M, Error> {
        let columns: Vec<&str> = values.iter().map(|(column, _)| *column).collect();
        let placeholders = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            self.name,
            columns.join(", "),
            placeholders,
            self.columns,
        );

        connection
            .prepare(&sql)?
            .query_row(
                params_from_iter(values.iter().map(|(_, value)| *value)),
                M::map_row,
            )
            .map_err(Error::from)
    }

    /// Return all rows matching `filter`, or every row for an empty filter.
    ///
    /// The result is unordered unless the filter carries an ORDER BY.
    ///
    /// # Errors
    /// Returns an error if there is an SQL error.
    pub fn find(&self, connection: &Connection, filter: &Filter) -> Result<Vec<M>, Error> {
        let sql = format!(
            "SELECT {} FROM {}{}",
            self.columns,
            self.name,
            filter.render()
        );

        connection
            .prepare(&sql)?
            .query_map(params_from_iter(filter.params()), M::map_row)?
            .map(|row| row.map_err(Error::from))
            .collect()
    }

    /// Return the first row matching `filter`, or `None`.
    ///
    /// # Errors
    /// Returns an error if there is an SQL error.
    pub fn find_one(&self, connection: &Connection, filter: &Filter) -> Result<Option<M>, Error> {
        let sql = format!(
            "SELECT {} FROM {}{} LIMIT 1",
            self.columns,
            self.name,
            filter.render()
        );

        connection
            .prepare(&sql)?
            .query_row(params_from_iter(filter.params()), M::map_row)
            .optional()
            .map_err(Error::from)
    }

    /// Apply `patch` to the rows matching `filter` and return the updated
    /// row.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if no row matched, or an error if a
    /// constraint was violated or the statement failed.
    pub fn update(
        &self,
        connection: &Connection,
        patch: &ColumnValues,
        filter: &Filter,
    ) -> Result<M, Error> {
        let set_list: Vec<String> = patch
            .iter()
            .map(|(column, _)| format!("{column} = ?"))
            .collect();
        let sql = format!(
            "UPDATE {} SET {}{} RETURNING {}",
            self.name,
            set_list.join(", "),
            filter.render(),
            self.columns,
        );

        connection
            .prepare(&sql)?
            .query_row(
                params_from_iter(patch.iter().map(|(_, value)| *value).chain(filter.params())),
                M::map_row,
            )
            .map_err(Error::from)
    }

    /// Delete the rows matching `filter` and return the deleted row if any.
    ///
    /// # Errors
    /// Returns an error if there is an SQL error.
    pub fn delete(&self, connection: &Connection, filter: &Filter) -> Result<Option<M>, Error> {
        let sql = format!(
            "DELETE FROM {}{} RETURNING {}",
            self.name,
            filter.render(),
            self.columns,
        );

        connection
            .prepare(&sql)?
            .query_row(params_from_iter(filter.params()), M::map_row)
            .optional()
            .map_err(Error::from)
    }
}

impl CreateTable for User {
    fn create_table(connection: &Connection) -> Result<(), Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY,
                    username TEXT UNIQUE NOT NULL,
                    name TEXT NOT NULL,
                    password_hash TEXT NOT NULL,
                    provider_type TEXT,
                    provider_user_id TEXT,
                    avatar_url TEXT
                    )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for User {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            username: row.get(offset + 1)?,
            name: row.get(offset + 2)?,
            password_hash: PasswordHash::new_unchecked(row.get(offset + 3)?),
            provider_type: row.get(offset + 4)?,
            provider_user_id: row.get(offset + 5)?,
            avatar_url: row.get(offset + 6)?,
        })
    }
}

impl CreateTable for Category {
    fn create_table(connection: &Connection) -> Result<(), Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS categories (
                    id INTEGER PRIMARY KEY,
                    user_id INTEGER,
                    name TEXT NOT NULL,
                    type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                    FOREIGN KEY(user_id) REFERENCES users(id) ON UPDATE CASCADE ON DELETE CASCADE
                    )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for Category {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            user_id: row.get(offset + 1)?,
            name: row.get(offset + 2)?,
            entry_type: row.get(offset + 3)?,
        })
    }
}

impl CreateTable for Transaction {
    fn create_table(connection: &Connection) -> Result<(), Error> {
        connection.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                    id INTEGER PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    category_id INTEGER,
                    amount REAL NOT NULL,
                    type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                    description TEXT,
                    note TEXT,
                    is_recurring INTEGER NOT NULL DEFAULT 0,
                    date TEXT NOT NULL,
                    FOREIGN KEY(user_id) REFERENCES users(id) ON UPDATE CASCADE ON DELETE CASCADE,
                    FOREIGN KEY(category_id) REFERENCES categories(id) ON UPDATE CASCADE ON DELETE SET NULL
                    )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for Transaction {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            user_id: row.get(offset + 1)?,
            category_id: row.get(offset + 2)?,
            amount: row.get(offset + 3)?,
            entry_type: row.get(offset + 4)?,
            description: row.get(offset + 5)?,
            note: row.get(offset + 6)?,
            is_recurring: row.get(offset + 7)?,
            date: row.get(offset + 8)?,
        })
    }
}

impl CreateTable for Budget {
    fn create_table(connection: &Connection) -> Result<(), Error> {
        // The unique constraint closes the race between the controller's
        // duplicate pre-check and the insert.
        connection.execute(
            "CREATE TABLE IF NOT EXISTS budgets (
                    id INTEGER PRIMARY KEY,
                    user_id INTEGER NOT NULL,
                    category_id INTEGER NOT NULL,
                    month TEXT NOT NULL,
                    amount REAL NOT NULL,
                    FOREIGN KEY(user_id) REFERENCES users(id) ON UPDATE CASCADE ON DELETE CASCADE,
                    FOREIGN KEY(category_id) REFERENCES categories(id) ON UPDATE CASCADE ON DELETE CASCADE,
                    UNIQUE(user_id, category_id, month)
                    )",
            (),
        )?;

        Ok(())
    }
}

impl MapRow for Budget {
    type ReturnType = Self;

    fn map_row_with_offset(row: &Row, offset: usize) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get(offset)?,
            user_id: row.get(offset + 1)?,
            category_id: row.get(offset + 2)?,
            month: row.get(offset + 3)?,
            amount: row.get(offset + 4)?,
        })
    }
}

/// Create the reporting views.
///
/// `user_yearly_summary` totals each user's income and expenses per calendar
/// month; `expense_budget_summary` compares each budget against the actual
/// expenses of its category and month.
fn create_views(connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "CREATE VIEW IF NOT EXISTS user_yearly_summary AS
            SELECT
                user_id,
                CAST(strftime('%Y', date) AS INTEGER) AS year,
                CAST(strftime('%m', date) AS INTEGER) AS month,
                SUM(CASE WHEN type = 'income' THEN amount ELSE 0 END) AS total_income,
                SUM(CASE WHEN type = 'expense' THEN amount ELSE 0 END) AS total_expense
            FROM transactions
            GROUP BY user_id, year, month",
        (),
    )?;

    connection.execute(
        "CREATE VIEW IF NOT EXISTS expense_budget_summary AS
            SELECT
                b.user_id AS user_id,
                b.category_id AS category_id,
                c.name AS category_name,
                b.month AS month,
                COALESCE(t.total_expense, 0) AS total_expense,
                b.amount AS budget_amount,
                COALESCE(t.total_expense, 0) - b.amount AS over_budget,
                COALESCE(t.total_expense, 0) > b.amount AS is_over_budget
            FROM budgets b
            INNER JOIN categories c ON c.id = b.category_id
            LEFT JOIN (
                SELECT user_id, category_id, strftime('%Y-%m', date) AS month,
                       SUM(amount) AS total_expense
                FROM transactions
                WHERE type = 'expense'
                GROUP BY user_id, category_id, month
            ) t ON t.user_id = b.user_id
               AND t.category_id = b.category_id
               AND t.month = b.month",
        (),
    )?;

    Ok(())
}

/// Create the application's tables and reporting views if they do not exist
/// yet, and enable foreign key enforcement on `connection`.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    User::create_table(&transaction)?;
    Category::create_table(&transaction)?;
    Transaction::create_table(&transaction)?;
    Budget::create_table(&transaction)?;
    create_views(&transaction)?;

    transaction.commit()?;

    connection.pragma_update(None, "foreign_keys", true)?;

    Ok(())
}

#[cfg(test)]
mod table_tests {
    use rusqlite::Connection;

    use crate::{
        db::{initialize, Filter, Table},
        models::{EntryType, Month, PasswordHash, User, UserID},
        Error,
    };

    const USERS: Table<User> = Table::new(
        "users",
        "id, username, name, password_hash, provider_type, provider_user_id, avatar_url",
    );

    fn init_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn insert_test_user(conn: &Connection, username: &str) -> User {
        USERS
            .insert(
                conn,
                &[
                    ("username", &username),
                    ("name", &"Test User"),
                    ("password_hash", &PasswordHash::new_unchecked("hash".to_string())),
                    ("provider_type", &"local"),
                    ("provider_user_id", &""),
                    ("avatar_url", &""),
                ],
            )
            .unwrap()
    }

    #[test]
    fn insert_returns_stored_row_with_generated_id() {
        let conn = init_db();

        let user = insert_test_user(&conn, "alice");

        assert!(user.id.as_i64() > 0);
        assert_eq!(user.username, "alice");
        assert_eq!(user.name, "Test User");
    }

    #[test]
    fn insert_duplicate_username_fails_with_conflict() {
        let conn = init_db();
        insert_test_user(&conn, "alice");

        let result = USERS.insert(
            &conn,
            &[
                ("username", &"alice"),
                ("name", &"Impostor"),
                ("password_hash", &"otherhash"),
            ],
        );

        assert!(matches!(result, Err(Error::DuplicateUsername)));
    }

    #[test]
    fn find_returns_empty_vec_when_nothing_matches() {
        let conn = init_db();

        let users = USERS
            .find(&conn, &Filter::new().eq("username", "nobody".to_string()))
            .unwrap();

        assert_eq!(users, vec![]);
    }

    #[test]
    fn find_one_matches_by_bound_parameter() {
        let conn = init_db();
        let inserted = insert_test_user(&conn, "alice");
        insert_test_user(&conn, "bob");

        let found = USERS
            .find_one(&conn, &Filter::new().eq("username", "alice".to_string()))
            .unwrap();

        assert_eq!(found, Some(inserted));
    }

    #[test]
    fn find_one_treats_malicious_value_as_plain_text() {
        let conn = init_db();
        insert_test_user(&conn, "alice");

        // Bound as a parameter, this matches no row instead of widening the
        // predicate.
        let found = USERS
            .find_one(
                &conn,
                &Filter::new().eq("username", "alice' OR '1'='1".to_string()),
            )
            .unwrap();

        assert_eq!(found, None);
    }

    #[test]
    fn update_patches_only_listed_columns() {
        let conn = init_db();
        let user = insert_test_user(&conn, "alice");

        let updated = USERS
            .update(
                &conn,
                &[("name", &"Renamed")],
                &Filter::new().eq("id", user.id),
            )
            .unwrap();

        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.username, user.username);
        assert_eq!(updated.password_hash, user.password_hash);
    }

    #[test]
    fn update_fails_with_not_found_when_no_row_matches() {
        let conn = init_db();

        let result = USERS.update(
            &conn,
            &[("name", &"Renamed")],
            &Filter::new().eq("id", UserID::new(1337)),
        );

        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn delete_returns_deleted_row_then_none() {
        let conn = init_db();
        let user = insert_test_user(&conn, "alice");
        let filter = Filter::new().eq("id", user.id);

        let deleted = USERS.delete(&conn, &filter).unwrap();
        let deleted_again = USERS.delete(&conn, &filter).unwrap();

        assert_eq!(deleted, Some(user));
        assert_eq!(deleted_again, None);
    }

    #[test]
    fn filter_order_by_controls_row_order() {
        let conn = init_db();
        insert_test_user(&conn, "bob");
        insert_test_user(&conn, "alice");

        let users = USERS
            .find(&conn, &Filter::new().order_by("username ASC"))
            .unwrap();

        let usernames: Vec<&str> = users.iter().map(|user| user.username.as_str()).collect();
        assert_eq!(usernames, vec!["alice", "bob"]);
    }

    #[test]
    fn duplicate_budget_insert_fails_despite_skipped_pre_check() {
        use crate::models::Budget;

        const BUDGETS: Table<Budget> =
            Table::new("budgets", "id, user_id, category_id, month, amount");
        const CATEGORIES: Table<crate::models::Category> =
            Table::new("categories", "id, user_id, name, type");

        let conn = init_db();
        let user = insert_test_user(&conn, "alice");
        let category = CATEGORIES
            .insert(
                &conn,
                &[
                    ("user_id", &user.id),
                    ("name", &"Food"),
                    ("type", &EntryType::Expense),
                ],
            )
            .unwrap();
        let month = Month::new("2025-06").unwrap();

        let values: [(&'static str, &dyn rusqlite::types::ToSql); 4] = [
            ("user_id", &user.id),
            ("category_id", &category.id),
            ("month", &month),
            ("amount", &500.0),
        ];

        assert!(BUDGETS.insert(&conn, &values).is_ok());
        assert!(matches!(
            BUDGETS.insert(&conn, &values),
            Err(Error::DuplicateBudget)
        ));
    }
}
