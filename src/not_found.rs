//! The fallback for requests that do not match a route.

use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{Error, html::error_view};

/// Respond with a JSON error for API paths and an HTML page for everything else.
pub async fn get_404_not_found(request: Request) -> Response {
    if request.uri().path().starts_with("/api/") {
        return Error::NotFound.into_response();
    }

    get_404_not_found_response()
}

pub fn get_404_not_found_response() -> Response {
    (
        StatusCode::NOT_FOUND,
        error_view(
            "Not Found",
            "404",
            "Page not found.",
            "Sorry, we can't find that page. Check the address or head back to the dashboard.",
        ),
    )
        .into_response()
}
