//! Transactions and their status lifecycle.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the database functions for storing and querying transactions
//! - The service functions that create, cancel, confirm and check transactions
//! - The JSON route handlers that expose those functions

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::AppState;

mod cancel_endpoint;
mod check_endpoint;
mod confirm_endpoint;
mod core;
mod create_endpoint;
mod service;

pub use cancel_endpoint::cancel_transaction_endpoint;
pub use check_endpoint::check_transaction_endpoint;
pub use confirm_endpoint::confirm_transaction_endpoint;
pub use core::{
    Transaction, TransactionId, TransactionStatus, TransactionTotals, count_transactions,
    count_transactions_with_status, create_transaction_table, delete_transaction,
    get_all_transactions, get_transactions_by_status, total_transactions_created_between,
    transition_status,
};
pub use create_endpoint::create_transaction_endpoint;
pub use service::{cancel_transaction, check_transaction, confirm_transaction, create_transaction};

#[cfg(test)]
pub use core::get_transaction;

/// The state needed by the transaction route handlers.
#[derive(Debug, Clone)]
pub struct TransactionState {
    /// The database connection for managing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl TransactionState {
    /// Wrap `connection` for sharing between route handlers.
    #[cfg(test)]
    pub fn new(connection: Connection) -> Self {
        Self {
            db_connection: Arc::new(Mutex::new(connection)),
        }
    }
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// A request that names a single transaction, either as a JSON body or a query string.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionIdRequest {
    /// The transaction the request refers to.
    pub transaction_id: TransactionId,
}

/// The response body for requests that change a transaction's status.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct StatusResponse {
    /// The status of the transaction after the request was handled.
    pub status: TransactionStatus,
}
