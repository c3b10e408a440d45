//! Defines the endpoint for canceling a pending transaction.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    transaction::{
        StatusResponse, TransactionIdRequest, TransactionState, cancel_transaction,
    },
};

/// A route handler for canceling a transaction.
///
/// Only pending transactions are canceled, any other transaction is left as is. Either way the
/// response holds the transaction's status after the request.
pub async fn cancel_transaction_endpoint(
    State(state): State<TransactionState>,
    request: Result<Json<TransactionIdRequest>, JsonRejection>,
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

    match cancel_transaction(request.transaction_id, &connection) {
        Ok(status) => Json(StatusResponse { status }).into_response(),
        Err(error) => {
            tracing::warn!(
                "could not cancel transaction {}: {error}",
                request.transaction_id
            );
            error.into_response()
        }
    }
}
