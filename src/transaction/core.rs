//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{Error, user::UserID};

// ============================================================================
// MODELS
// ============================================================================

/// Alias for the integer type used for transaction IDs in the database.
pub type TransactionId = i64;

/// Where a transaction is in its lifecycle.
///
/// Every transaction starts as [TransactionStatus::Pending]. The other three states are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Waiting to be confirmed, canceled or expired.
    Pending,
    /// Settled by an external party.
    Confirmed,
    /// Canceled by the client before it was settled.
    Canceled,
    /// Left pending for too long and swept up by the expiry job.
    Expired,
}

impl TransactionStatus {
    /// The name used in the database and in API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Confirmed => "confirmed",
            TransactionStatus::Canceled => "canceled",
            TransactionStatus::Expired => "expired",
        }
    }

    /// Whether the status can no longer change.
    pub fn is_terminal(&self) -> bool {
        *self != TransactionStatus::Pending
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "confirmed" => Ok(TransactionStatus::Confirmed),
            "canceled" => Ok(TransactionStatus::Canceled),
            "expired" => Ok(TransactionStatus::Expired),
            other => Err(format!("unknown transaction status \"{other}\"")),
        }
    }
}

impl ToSql for TransactionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// A payment owned by a user, with the commission charged on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The amount of money being paid.
    pub amount: f64,
    /// The commission charged for this transaction.
    ///
    /// This is `amount` multiplied by the owner's commission rate at the time the transaction
    /// was created and it does not change if the owner's rate changes later.
    pub commission: f64,
    /// Where the transaction is in its lifecycle.
    pub status: TransactionStatus,
    /// When the transaction was created, in UTC.
    pub created_at: OffsetDateTime,
    /// The user that owns the transaction.
    pub user_id: UserID,
}

/// The fields needed to insert a transaction, see [insert_transaction].
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// The amount of the transaction.
    pub amount: f64,
    /// The commission owed on the transaction.
    pub commission: f64,
    /// When the transaction was created.
    pub created_at: OffsetDateTime,
    /// The user that owns the transaction.
    pub user_id: UserID,
}

/// The number of transactions in a set and the sums of their amounts and commissions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TransactionTotals {
    /// The number of transactions.
    pub count: u32,
    /// The sum of the transactions' amounts.
    pub amount: f64,
    /// The sum of the transactions' commissions.
    pub commission: f64,
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                amount REAL NOT NULL,
                commission REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                )",
        (),
    )?;

    // The expiry sweep only ever looks at pending transactions.
    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_status ON \"transaction\"(status);",
        (),
    )?;

    Ok(())
}

/// Insert a new pending transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::UserNotFound] if `user_id` does not refer to a user,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn insert_transaction(
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = connection
        .prepare(
            "INSERT INTO \"transaction\" (amount, commission, status, created_at, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, amount, commission, status, created_at, user_id",
        )?
        .query_row(
            (
                new_transaction.amount,
                new_transaction.commission,
                TransactionStatus::Pending,
                new_transaction.created_at,
                new_transaction.user_id.as_i64(),
            ),
            map_transaction_row,
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::UserNotFound,
            error => error.into(),
        })?;

    Ok(transaction)
}

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    connection
        .prepare(
            "SELECT id, amount, commission, status, created_at, user_id
             FROM \"transaction\" WHERE id = :id",
        )?
        .query_row(&[(":id", &id)], map_transaction_row)
        .map_err(|error| match Error::from(error) {
            Error::NotFound => Error::TransactionNotFound,
            error => error,
        })
}

/// Get every transaction with the given `status`, oldest first.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_transactions_by_status(
    status: TransactionStatus,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, amount, commission, status, created_at, user_id
             FROM \"transaction\" WHERE status = :status ORDER BY id ASC",
        )?
        .query_map(&[(":status", &status)], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Get every transaction, newest first.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn get_all_transactions(connection: &Connection) -> Result<Vec<Transaction>, Error> {
    connection
        .prepare(
            "SELECT id, amount, commission, status, created_at, user_id
             FROM \"transaction\" ORDER BY id DESC",
        )?
        .query_map([], map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Move the transaction `id` from the status `from` to the status `to`.
///
/// The update only happens if the stored status still equals `from`, so two writers racing to
/// change the same transaction cannot overwrite each other. Returns `true` if this call made the
/// change and `false` if the status was no longer `from` (or the transaction does not exist).
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn transition_status(
    id: TransactionId,
    from: TransactionStatus,
    to: TransactionStatus,
    connection: &Connection,
) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        "UPDATE \"transaction\" SET status = ?1 WHERE id = ?2 AND status = ?3",
        (to, id, from),
    )?;

    Ok(rows_affected == 1)
}

/// Delete the transaction `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::TransactionNotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_transaction(id: TransactionId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "DELETE FROM \"transaction\" WHERE id = :id",
        &[(":id", &id)],
    )?;

    if rows_affected == 0 {
        return Err(Error::TransactionNotFound);
    }

    Ok(())
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Get the number of transactions with the given `status`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions_with_status(
    status: TransactionStatus,
    connection: &Connection,
) -> Result<u32, Error> {
    connection
        .query_row(
            "SELECT COUNT(id) FROM \"transaction\" WHERE status = ?1;",
            [status],
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Total the pending and confirmed transactions created in `[start, end)`.
///
/// Canceled and expired transactions are left out since no money changes hands for them.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn total_transactions_created_between(
    start: OffsetDateTime,
    end: OffsetDateTime,
    connection: &Connection,
) -> Result<TransactionTotals, Error> {
    // Timestamps may carry different offsets, so compare them as instants rather than as text.
    connection
        .query_row(
            "SELECT COUNT(id), COALESCE(SUM(amount), 0.0), COALESCE(SUM(commission), 0.0)
             FROM \"transaction\"
             WHERE julianday(created_at) >= julianday(?1)
               AND julianday(created_at) < julianday(?2)
               AND status IN (?3, ?4);",
            (
                start,
                end,
                TransactionStatus::Pending,
                TransactionStatus::Confirmed,
            ),
            |row| {
                Ok(TransactionTotals {
                    count: row.get(0)?,
                    amount: row.get(1)?,
                    commission: row.get(2)?,
                })
            },
        )
        .map_err(|error| error.into())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let id = row.get(0)?;
    let amount = row.get(1)?;
    let commission = row.get(2)?;
    let status = row.get(3)?;
    let created_at = row.get(4)?;
    let user_id = UserID::new(row.get(5)?);

    Ok(Transaction {
        id,
        amount,
        commission,
        status,
        created_at,
        user_id,
    })
}

// ============================================================================
// TESTS
// ============================================================================
