//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, db::initialize, timezone::get_local_offset, webhook::WebhookQueue};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The queue that expiry notifications are put on for the webhook worker.
    pub webhook_queue: WebhookQueue,

    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized or `local_timezone` is not a known
    /// timezone.
    pub fn new(
        db_connection: Connection,
        local_timezone: &str,
        webhook_queue: WebhookQueue,
    ) -> Result<Self, Error> {
        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezone(local_timezone.to_owned()));
        }

        initialize(&db_connection)?;

        Ok(Self {
            local_timezone: local_timezone.to_owned(),
            webhook_queue,
            db_connection: Arc::new(Mutex::new(db_connection)),
        })
    }
}
