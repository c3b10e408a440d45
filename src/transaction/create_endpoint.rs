//! Defines the endpoint for creating a new transaction.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    transaction::{TransactionId, TransactionState, create_transaction},
    user::UserID,
};

/// The request body for creating a transaction.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    /// The user that will own the transaction.
    pub user_id: UserID,
    /// The amount of the transaction.
    pub amount: f64,
}

/// The response body for a created transaction.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CreateTransactionResponse {
    /// The ID of the new transaction.
    pub transaction_id: TransactionId,
}

/// A route handler for creating a new pending transaction.
///
/// Responds with 201 and the new transaction's ID on success.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    request: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return Error::InvalidRequest(rejection.body_text()).into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match create_transaction(
        request.user_id,
        request.amount,
        OffsetDateTime::now_utc(),
        &connection,
    ) {
        Ok(transaction) => {
            tracing::info!(
                "Created transaction {} for user {} with commission {}",
                transaction.id,
                transaction.user_id,
                transaction.commission
            );

            (
                StatusCode::CREATED,
                Json(CreateTransactionResponse {
                    transaction_id: transaction.id,
                }),
            )
                .into_response()
        }
        Err(error) => {
            tracing::warn!("could not create transaction: {error}");
            error.into_response()
        }
    }
}
