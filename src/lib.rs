//! A ledger of user transactions with commission tracking.
//!
//! This library provides:
//! - a JSON API for creating, canceling, confirming and checking transactions,
//! - a background sweeper that expires transactions left pending for too long,
//! - a webhook worker that tells users when their transactions expire,
//! - and server-rendered admin pages for managing users and transactions.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod admin;
mod api_docs;
mod alert;
mod app_state;
mod db;
mod endpoints;
mod html;
mod logging;
mod navigation;
mod not_found;
mod routing;
mod sweeper;
mod timezone;
mod transaction;
mod user;
mod webhook;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use routing::build_router;
pub use sweeper::{SweepReport, SweeperConfig, run_sweeper, sweep_once};
pub use timezone::get_local_offset;
pub use transaction::{Transaction, TransactionId, TransactionStatus};
pub use user::{NewUser, Role, User, UserID, create_user};
pub use webhook::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT, DeliveryOutcome, RetryPolicy, WebhookQueue,
    WebhookReceiver, WorkerSummary, build_http_client, run_webhook_worker, webhook_channel,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Could not listen for the Ctrl+C signal: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate_signal) => {
                terminate_signal.recv().await;
            }
            Err(error) => {
                tracing::error!("Could not listen for the terminate signal: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
        },
    }

    handle.graceful_shutdown(Some(Duration::from_secs(1)));
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user ID does not refer to a user.
    #[error("User not found")]
    UserNotFound,

    /// The transaction ID does not refer to a transaction.
    #[error("Transaction not found")]
    TransactionNotFound,

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A transaction amount must be a finite number greater than zero.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    InvalidAmount(f64),

    /// A commission rate must be a finite number no less than zero.
    #[error("{0} is not a valid commission rate, rates must be zero or more")]
    InvalidCommissionRate(f64),

    /// A user's balance must be a finite number.
    #[error("{0} is not a valid balance, balances must be finite numbers")]
    InvalidBalance(f64),

    /// A webhook URL must be an absolute http or https URL.
    #[error("\"{0}\" is not a valid webhook URL")]
    InvalidWebhookUrl(String),

    /// The request body or query string could not be parsed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The transaction has already reached a terminal status that does not allow the requested
    /// change.
    #[error("transaction {id} is {status} and cannot be changed")]
    TransitionConflict {
        /// The transaction that was asked to change.
        id: TransactionId,
        /// The status the transaction is stuck in.
        status: TransactionStatus,
    },

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezone(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::UserNotFound | Error::TransactionNotFound | Error::NotFound => {
                StatusCode::NOT_FOUND
            }
            Error::InvalidAmount(_)
            | Error::InvalidCommissionRate(_)
            | Error::InvalidBalance(_)
            | Error::InvalidWebhookUrl(_)
            | Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::TransitionConflict { .. } => StatusCode::CONFLICT,
            Error::InvalidTimezone(_) | Error::DatabaseLockError | Error::SqlError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Errors are sent to API clients as `{"error": "<message>"}`.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        let message = if status_code.is_server_error() {
            // Details of server errors are for the logs only.
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod error_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{Error, TransactionStatus, test_utils::read_json};

    #[tokio::test]
    async fn not_found_errors_respond_with_404_and_message() {
        let response = Error::TransactionNotFound.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_json(response).await;
        assert_eq!(body["error"], "Transaction not found");
    }

    #[tokio::test]
    async fn conflict_responds_with_409() {
        let response = Error::TransitionConflict {
            id: 3,
            status: TransactionStatus::Expired,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = read_json(response).await;
        assert_eq!(body["error"], "transaction 3 is expired and cannot be changed");
    }

    #[tokio::test]
    async fn invalid_balance_is_bad_request() {
        let response = Error::InvalidBalance(f64::NAN).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(
            body["error"],
            "NaN is not a valid balance, balances must be finite numbers"
        );
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let response = Error::DatabaseLockError.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(response).await;
        assert!(
            !body["error"]
                .as_str()
                .unwrap()
                .contains("database lock")
        );
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        assert_eq!(
            Error::from(rusqlite::Error::QueryReturnedNoRows),
            Error::NotFound
        );
    }
}
