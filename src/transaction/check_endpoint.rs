//! Defines the endpoint for checking the status of a transaction.

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    transaction::{TransactionIdRequest, TransactionState, check_transaction},
};

/// A route handler for getting a transaction's ID and status.
///
/// The transaction ID is read from the `transaction_id` query parameter.
pub async fn check_transaction_endpoint(
    State(state): State<TransactionState>,
    query: Result<Query<TransactionIdRequest>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => return Error::InvalidRequest(rejection.body_text()).into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    check_transaction(query.transaction_id, &connection)
        .map(Json)
        .into_response()
}
