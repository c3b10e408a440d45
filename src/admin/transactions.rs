//! The page listing transactions and the endpoint for deleting them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};

use crate::{
    Error,
    admin::AdminState,
    endpoints::{self, format_endpoint},
    html::{
        BADGE_STYLE, BUTTON_DELETE_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE,
        TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base, format_currency, format_date_time,
    },
    navigation::NavBar,
    timezone::get_local_offset,
    transaction::{
        Transaction, TransactionId, TransactionStatus, delete_transaction, get_all_transactions,
    },
};

/// Render the table of all transactions, newest first.
pub async fn get_transactions_page(State(state): State<AdminState>) -> Response {
    let Some(local_offset) = get_local_offset(&state.local_timezone) else {
        return Error::InvalidTimezone(state.local_timezone).into_page_response();
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_page_response();
        }
    };

    match get_all_transactions(&connection) {
        Ok(transactions) => {
            let transactions: Vec<_> = transactions
                .into_iter()
                .map(|transaction| Transaction {
                    created_at: transaction.created_at.to_offset(local_offset),
                    ..transaction
                })
                .collect();

            transactions_view(&transactions).into_response()
        }
        Err(error) => {
            tracing::error!("could not get transactions: {error}");
            error.into_page_response()
        }
    }
}

/// Delete the record of the transaction `transaction_id`.
pub async fn delete_transaction_endpoint(
    State(state): State<AdminState>,
    Path(transaction_id): Path<TransactionId>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match delete_transaction(transaction_id, &connection) {
        Ok(()) => {
            tracing::info!("Deleted transaction {transaction_id}");
            (
                HxRedirect(endpoints::ADMIN_TRANSACTIONS_VIEW.to_owned()),
                StatusCode::OK,
            )
                .into_response()
        }
        Err(error) => {
            tracing::warn!("could not delete transaction {transaction_id}: {error}");
            error.into_alert_response()
        }
    }
}

fn status_badge(status: TransactionStatus) -> Markup {
    let colour = match status {
        TransactionStatus::Pending => "text-yellow-800 bg-yellow-100",
        TransactionStatus::Confirmed => "text-green-800 bg-green-100",
        TransactionStatus::Canceled => "text-gray-800 bg-gray-100",
        TransactionStatus::Expired => "text-red-800 bg-red-100",
    };

    html! {
        span class={ (BADGE_STYLE) " " (colour) } { (status) }
    }
}

fn transaction_row_view(transaction: &Transaction) -> Markup {
    let user_url = format_endpoint(endpoints::ADMIN_EDIT_USER_VIEW, transaction.user_id.as_i64());
    let delete_url = format_endpoint(endpoints::ADMIN_TRANSACTION, transaction.id);

    html! {
        tr class=(TABLE_ROW_STYLE)
        {
            td class=(TABLE_CELL_STYLE) { (transaction.id) }
            td class=(TABLE_CELL_STYLE)
            {
                a href=(user_url) class=(LINK_STYLE) { (transaction.user_id) }
            }
            td class=(TABLE_CELL_STYLE) { (format_currency(transaction.amount)) }
            td class=(TABLE_CELL_STYLE) { (format_currency(transaction.commission)) }
            td class=(TABLE_CELL_STYLE) { (status_badge(transaction.status)) }
            td class=(TABLE_CELL_STYLE) { (format_date_time(transaction.created_at)) }
            td class=(TABLE_CELL_STYLE)
            {
                button
                    hx-delete=(delete_url)
                    hx-confirm={ "Delete transaction " (transaction.id) "?" }
                    hx-target-error="#alert-container"
                    class=(BUTTON_DELETE_STYLE)
                {
                    "Delete"
                }
            }
        }
    }
}

fn transactions_view(transactions: &[Transaction]) -> Markup {
    let nav_bar = NavBar::new(endpoints::ADMIN_TRANSACTIONS_VIEW).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-4" { "Transactions" }

            @if transactions.is_empty() {
                p { "No transactions yet." }
            } @else {
                div class="relative overflow-x-auto shadow-md rounded-lg w-full max-w-6xl"
                {
                    table class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                th scope="col" class=(TABLE_CELL_STYLE) { "ID" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "User" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Amount" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Commission" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Status" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Created" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Actions" }
                            }
                        }

                        tbody
                        {
                            @for transaction in transactions {
                                (transaction_row_view(transaction))
                            }
                        }
                    }
                }
            }
        }
    };

    base("Transactions", &content)
}
