//! The shared state of the REST server.

use std::sync::{Arc, Mutex, MutexGuard};

use jsonwebtoken::{DecodingKey, EncodingKey};
use rusqlite::Connection;

use crate::Error;

/// The state of the REST server.
///
/// Holds the injected database connection and the JWT keys. The connection
/// is owned by the process bootstrap and shared between handlers; there is
/// no module-level global.
#[derive(Clone)]
pub struct AppConfig {
    db_connection: Arc<Mutex<Connection>>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AppConfig {
    /// Create the app state from an open database connection and the token
    /// signing secret.
    pub fn new(db_connection: Connection, secret: &str) -> Self {
        Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Acquire the database connection.
    ///
    /// # Errors
    /// Returns [Error::DatabaseLock] if the lock is poisoned.
    pub fn db_connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection.lock().map_err(|_| Error::DatabaseLock)
    }

    /// The key used to sign tokens.
    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// The key used to verify tokens.
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}
