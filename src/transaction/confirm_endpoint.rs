//! Defines the endpoint that settlement providers call to confirm a transaction.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    transaction::{
        StatusResponse, TransactionIdRequest, TransactionState, confirm_transaction,
    },
};

/// A route handler for confirming a pending transaction.
///
/// Responds with 409 if the transaction was already canceled or has expired.
pub async fn confirm_transaction_endpoint(
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

    match confirm_transaction(request.transaction_id, &connection) {
        Ok(status) => Json(StatusResponse { status }).into_response(),
        Err(error) => {
            tracing::warn!(
                "could not confirm transaction {}: {error}",
                request.transaction_id
            );
            error.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, extract::State, http::StatusCode};
    use time::OffsetDateTime;

    use crate::{
        test_utils::{get_test_connection, read_json},
        transaction::{
            TransactionIdRequest, TransactionState, TransactionStatus,
            confirm_endpoint::confirm_transaction_endpoint,
            service::{cancel_transaction, create_transaction},
        },
        user::{NewUser, create_user},
    };

    #[tokio::test]
    async fn confirms_pending_transaction() {
        let conn = get_test_connection();
        let user = create_user(NewUser::default(), &conn).unwrap();
        let transaction =
            create_transaction(user.id, 10.0, OffsetDateTime::now_utc(), &conn).unwrap();
        let state = TransactionState::new(conn);

        let response = confirm_transaction_endpoint(
            State(state),
            Ok(Json(TransactionIdRequest {
                transaction_id: transaction.id,
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], TransactionStatus::Confirmed.as_str());
    }

    #[tokio::test]
    async fn canceled_transaction_responds_with_409() {
        let conn = get_test_connection();
        let user = create_user(NewUser::default(), &conn).unwrap();
        let transaction =
            create_transaction(user.id, 10.0, OffsetDateTime::now_utc(), &conn).unwrap();
        cancel_transaction(transaction.id, &conn).unwrap();
        let state = TransactionState::new(conn);

        let response = confirm_transaction_endpoint(
            State(state),
            Ok(Json(TransactionIdRequest {
                transaction_id: transaction.id,
            })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
