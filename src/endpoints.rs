//! The endpoint URIs for the JSON API and the admin pages.
//!
//! For endpoints that take a parameter, e.g., '/admin/users/{user_id}', use [format_endpoint].

/// The root route which redirects to the admin dashboard.
pub const ROOT: &str = "/";

/// The route to create a pending transaction.
pub const CREATE_TRANSACTION: &str = "/api/create_transaction";
/// The route to cancel a pending transaction.
pub const CANCEL_TRANSACTION: &str = "/api/cancel_transaction";
/// The route to check a transaction's status.
pub const CHECK_TRANSACTION: &str = "/api/check_transaction";
/// The route for settlement providers to confirm a transaction.
pub const CONFIRM_TRANSACTION: &str = "/api/confirm_transaction";

/// The OpenAPI document describing the JSON API.
pub const API_DOCS_JSON: &str = "/api/openapi.json";
/// The Swagger UI page for browsing the JSON API.
pub const API_DOCS_VIEW: &str = "/api/docs";

/// The admin landing page with summary figures.
pub const ADMIN_DASHBOARD_VIEW: &str = "/admin";
/// The page listing all users, and the route for creating a user.
pub const ADMIN_USERS_VIEW: &str = "/admin/users";
/// The page with the form for creating a user.
pub const ADMIN_NEW_USER_VIEW: &str = "/admin/users/new";
/// The page with the form for editing a user.
pub const ADMIN_EDIT_USER_VIEW: &str = "/admin/users/{user_id}/edit";
/// The route for updating or deleting a user.
pub const ADMIN_USER: &str = "/admin/users/{user_id}";
/// The page listing all transactions.
pub const ADMIN_TRANSACTIONS_VIEW: &str = "/admin/transactions";
/// The route for deleting a transaction.
pub const ADMIN_TRANSACTION: &str = "/admin/transactions/{transaction_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is the text between a left brace and the next right brace, e.g. '{user_id}' in
/// '/admin/users/{user_id}/edit'. Only the first parameter is replaced.
///
/// If no parameter is found in `endpoint_path`, the function returns the original
/// `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |offset| param_start + offset + 1);

    format!(
        "{}{id}{}",
        &endpoint_path[..param_start],
        &endpoint_path[param_end..]
    )
}

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    use super::format_endpoint;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok(), "{uri} is not a valid URI");
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::CREATE_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::CANCEL_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::CHECK_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::CONFIRM_TRANSACTION);
        assert_endpoint_is_valid_uri(endpoints::API_DOCS_JSON);
        assert_endpoint_is_valid_uri(endpoints::API_DOCS_VIEW);

        assert_endpoint_is_valid_uri(endpoints::ADMIN_DASHBOARD_VIEW);
        assert_endpoint_is_valid_uri(endpoints::ADMIN_USERS_VIEW);
        assert_endpoint_is_valid_uri(endpoints::ADMIN_NEW_USER_VIEW);
        assert_endpoint_is_valid_uri(&format_endpoint(endpoints::ADMIN_EDIT_USER_VIEW, 1));
        assert_endpoint_is_valid_uri(&format_endpoint(endpoints::ADMIN_USER, 1));
        assert_endpoint_is_valid_uri(endpoints::ADMIN_TRANSACTIONS_VIEW);
        assert_endpoint_is_valid_uri(&format_endpoint(endpoints::ADMIN_TRANSACTION, 1));
    }

    #[test]
    fn replaces_parameter_at_end() {
        let formatted_path = format_endpoint(endpoints::ADMIN_USER, 12);

        assert_eq!(formatted_path, "/admin/users/12");
    }

    #[test]
    fn replaces_parameter_in_middle() {
        let formatted_path = format_endpoint(endpoints::ADMIN_EDIT_USER_VIEW, 3);

        assert_eq!(formatted_path, "/admin/users/3/edit");
    }

    #[test]
    fn returns_original_path_with_no_parameter() {
        let formatted_path = format_endpoint(endpoints::ADMIN_USERS_VIEW, 1);

        assert_eq!(formatted_path, endpoints::ADMIN_USERS_VIEW);
    }
}
