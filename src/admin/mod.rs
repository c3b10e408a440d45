//! Server-rendered pages for managing users and transactions.

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::AppState;

mod dashboard;
mod transactions;
mod user_form;
mod users;

pub use dashboard::get_dashboard_page;
pub use transactions::{delete_transaction_endpoint, get_transactions_page};
pub use user_form::{
    create_user_endpoint, get_edit_user_page, get_new_user_page, update_user_endpoint,
};
pub use users::{delete_user_endpoint, get_users_page};

/// The state needed by the admin pages.
#[derive(Debug, Clone)]
pub struct AdminState {
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// The database connection for managing users and transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AdminState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            local_timezone: state.local_timezone.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

#[cfg(test)]
impl AdminState {
    /// Admin state backed by `connection` in UTC.
    pub fn new(connection: Connection) -> Self {
        Self {
            local_timezone: "Etc/UTC".to_owned(),
            db_connection: Arc::new(Mutex::new(connection)),
        }
    }
}
