//! The page listing users and the endpoint for deleting them.

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
        BUTTON_DELETE_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE,
        TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base, format_currency, format_rate,
    },
    navigation::NavBar,
    user::{User, UserID, delete_user, get_all_users},
};

/// Render the table of all users.
pub async fn get_users_page(State(state): State<AdminState>) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_page_response();
        }
    };

    match get_all_users(&connection) {
        Ok(users) => users_view(&users).into_response(),
        Err(error) => {
            tracing::error!("could not get users: {error}");
            error.into_page_response()
        }
    }
}

/// Delete the user `user_id` along with their transactions.
pub async fn delete_user_endpoint(
    State(state): State<AdminState>,
    Path(user_id): Path<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match delete_user(user_id, &connection) {
        Ok(()) => {
            tracing::info!("Deleted user {user_id}");
            (
                HxRedirect(endpoints::ADMIN_USERS_VIEW.to_owned()),
                StatusCode::OK,
            )
                .into_response()
        }
        Err(error) => {
            tracing::warn!("could not delete user {user_id}: {error}");
            error.into_alert_response()
        }
    }
}

fn user_row_view(user: &User) -> Markup {
    let edit_url = format_endpoint(endpoints::ADMIN_EDIT_USER_VIEW, user.id.as_i64());
    let delete_url = format_endpoint(endpoints::ADMIN_USER, user.id.as_i64());

    html! {
        tr class=(TABLE_ROW_STYLE)
        {
            td class=(TABLE_CELL_STYLE) { (user.id) }
            td class=(TABLE_CELL_STYLE) { (user.role) }
            td class=(TABLE_CELL_STYLE) { (format_currency(user.balance)) }
            td class=(TABLE_CELL_STYLE) { (format_rate(user.commission_rate)) }
            td class=(TABLE_CELL_STYLE) { (user.webhook_url.as_deref().unwrap_or("-")) }
            td class=(TABLE_CELL_STYLE) { (user.wallet_address.as_deref().unwrap_or("-")) }
            td class=(TABLE_CELL_STYLE)
            {
                div class="flex gap-4"
                {
                    a href=(edit_url) class=(LINK_STYLE) { "Edit" }

                    button
                        hx-delete=(delete_url)
                        hx-confirm={ "Delete user " (user.id) " and all of their transactions?" }
                        hx-target-error="#alert-container"
                        class=(BUTTON_DELETE_STYLE)
                    {
                        "Delete"
                    }
                }
            }
        }
    }
}

fn users_view(users: &[User]) -> Markup {
    let nav_bar = NavBar::new(endpoints::ADMIN_USERS_VIEW).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="flex justify-between items-center w-full max-w-6xl mb-4"
            {
                h1 class="text-2xl font-bold" { "Users" }
                a href=(endpoints::ADMIN_NEW_USER_VIEW) class=(LINK_STYLE) { "Create User" }
            }

            @if users.is_empty() {
                p { "No users yet." }
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
                                th scope="col" class=(TABLE_CELL_STYLE) { "Role" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Balance" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Commission Rate" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Webhook URL" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Wallet" }
                                th scope="col" class=(TABLE_CELL_STYLE) { "Actions" }
                            }
                        }

                        tbody
                        {
                            @for user in users {
                                (user_row_view(user))
                            }
                        }
                    }
                }
            }
        }
    };

    base("Users", &content)
}
