//! Application router configuration for the JSON API and the admin pages.

use axum::{
    Router,
    response::Redirect,
    routing::{delete, get, post, put},
};

use crate::{
    AppState,
    admin::{
        create_user_endpoint, delete_transaction_endpoint, delete_user_endpoint,
        get_dashboard_page, get_edit_user_page, get_new_user_page, get_transactions_page,
        get_users_page, update_user_endpoint,
    },
    api_docs::{get_api_docs_page, get_openapi_document},
    endpoints,
    not_found::get_404_not_found,
    transaction::{
        cancel_transaction_endpoint, check_transaction_endpoint, confirm_transaction_endpoint,
        create_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            endpoints::CREATE_TRANSACTION,
            post(create_transaction_endpoint),
        )
        .route(
            endpoints::CANCEL_TRANSACTION,
            post(cancel_transaction_endpoint),
        )
        .route(
            endpoints::CONFIRM_TRANSACTION,
            post(confirm_transaction_endpoint),
        )
        .route(endpoints::CHECK_TRANSACTION, get(check_transaction_endpoint))
        .route(endpoints::API_DOCS_JSON, get(get_openapi_document))
        .route(endpoints::API_DOCS_VIEW, get(get_api_docs_page));

    let admin_routes = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::ADMIN_DASHBOARD_VIEW, get(get_dashboard_page))
        .route(
            endpoints::ADMIN_USERS_VIEW,
            get(get_users_page).post(create_user_endpoint),
        )
        .route(endpoints::ADMIN_NEW_USER_VIEW, get(get_new_user_page))
        .route(endpoints::ADMIN_EDIT_USER_VIEW, get(get_edit_user_page))
        .route(
            endpoints::ADMIN_USER,
            put(update_user_endpoint).delete(delete_user_endpoint),
        )
        .route(
            endpoints::ADMIN_TRANSACTIONS_VIEW,
            get(get_transactions_page),
        )
        .route(
            endpoints::ADMIN_TRANSACTION,
            delete(delete_transaction_endpoint),
        );

    api_routes
        .merge(admin_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// The root path '/' redirects to the admin dashboard.
async fn get_index_page() -> Redirect {
    Redirect::to(endpoints::ADMIN_DASHBOARD_VIEW)
}

#[cfg(test)]
mod root_route_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{endpoints, routing::get_index_page};

    #[tokio::test]
    async fn root_redirects_to_dashboard() {
        let response = get_index_page().await.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers().get("location").unwrap();
        assert_eq!(location, endpoints::ADMIN_DASHBOARD_VIEW);
    }
}
