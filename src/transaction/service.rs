//! The transaction lifecycle: creating, canceling, confirming and checking transactions.
//!
//! These functions are shared by the JSON API and the admin pages. They take the current time
//! as an argument where it matters so the lifecycle can be tested without waiting on the clock.

use rusqlite::Connection;
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    transaction::core::{
        NewTransaction, Transaction, TransactionId, TransactionStatus, get_transaction,
        insert_transaction, transition_status,
    },
    user::{UserID, get_user_by_id},
};

/// The public view of a transaction's state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransactionStatusReport {
    /// The transaction that was checked.
    pub transaction_id: TransactionId,
    /// The transaction's current status.
    pub status: TransactionStatus,
}

/// Check that `amount` can be used for a new transaction.
///
/// # Errors
/// Returns [Error::InvalidAmount] if `amount` is not a finite number greater than zero.
pub fn validate_amount(amount: f64) -> Result<f64, Error> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(Error::InvalidAmount(amount))
    }
}

/// Create a pending transaction for the user `user_id`.
///
/// The commission is the amount multiplied by the user's current commission rate and is stored
/// with the transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if `amount` is not finite and positive,
/// - [Error::UserNotFound] if `user_id` does not refer to a user,
/// - or [Error::SqlError] if there is some other SQL error.
///
/// Nothing is written to the database when an error is returned.
pub fn create_transaction(
    user_id: UserID,
    amount: f64,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let amount = validate_amount(amount)?;
    let user = get_user_by_id(user_id, connection)?;

    insert_transaction(
        NewTransaction {
            amount,
            commission: amount * user.commission_rate,
            created_at: now,
            user_id: user.id,
        },
        connection,
    )
}

/// Cancel the transaction `id` if it is still pending.
///
/// Canceling a transaction that is already canceled, confirmed or expired changes nothing.
/// Either way the status after the call is returned.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn cancel_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<TransactionStatus, Error> {
    let transaction = get_transaction(id, connection)?;

    if transaction.status.is_terminal() {
        return Ok(transaction.status);
    }

    settle_pending(id, TransactionStatus::Canceled, connection)
}

/// Mark the transaction `id` as confirmed, i.e. settled by an external party.
///
/// Confirming an already confirmed transaction changes nothing.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction,
/// - [Error::TransitionConflict] if the transaction was canceled or has expired,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn confirm_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<TransactionStatus, Error> {
    let transaction = get_transaction(id, connection)?;

    let status = match transaction.status {
        TransactionStatus::Pending => settle_pending(id, TransactionStatus::Confirmed, connection)?,
        status => status,
    };

    match status {
        TransactionStatus::Confirmed => Ok(status),
        status => Err(Error::TransitionConflict { id, status }),
    }
}

/// Move the transaction `id` from pending to `status` and return the status it ends up in.
///
/// If another writer moved the transaction out of pending first, its status is left as is
/// and the stored status is returned.
fn settle_pending(
    id: TransactionId,
    status: TransactionStatus,
    connection: &Connection,
) -> Result<TransactionStatus, Error> {
    if transition_status(id, TransactionStatus::Pending, status, connection)? {
        tracing::info!("Transaction {id} is now {status}");
        return Ok(status);
    }

    let current_status = get_transaction(id, connection)?.status;
    tracing::debug!("Transaction {id} was already {current_status}, not moving it to {status}");

    Ok(current_status)
}

/// Get the current status of the transaction `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a transaction,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn check_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<TransactionStatusReport, Error> {
    let transaction = get_transaction(id, connection)?;

    Ok(TransactionStatusReport {
        transaction_id: transaction.id,
        status: transaction.status,
    })
}
