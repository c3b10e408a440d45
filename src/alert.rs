//! Alerts for telling the admin that an action failed.
//!
//! Alerts are HTML fragments that htmx swaps into the `#alert-container` element of the base
//! layout.

use axum::response::{IntoResponse, Response};
use maud::{Markup, html};

use crate::Error;

/// A message telling the admin that an action failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    message: String,
    /// May be empty.
    details: String,
}

impl Alert {
    fn into_html(self) -> Markup {
        html! {
            div
                class="p-4 mb-4 text-sm text-red-800 rounded-lg bg-red-50 \
                dark:bg-gray-800 dark:text-red-400"
                role="alert"
            {
                span class="font-medium" { (self.message) }

                @if !self.details.is_empty() {
                    p { (self.details) }
                }
            }
        }
    }
}

impl IntoResponse for Alert {
    fn into_response(self) -> Response {
        self.into_html().into_response()
    }
}

impl Error {
    /// Convert the error into an HTTP response with an HTML alert for the admin pages.
    pub fn into_alert_response(self) -> Response {
        let status_code = self.status_code();

        let alert = if status_code.is_server_error() {
            tracing::error!("An unexpected error occurred: {self}");
            Alert {
                message: "Something went wrong".to_owned(),
                details: "An unexpected error occurred, check the server logs for more details."
                    .to_owned(),
            }
        } else {
            Alert {
                message: self.to_string(),
                details: String::new(),
            }
        };

        (status_code, alert).into_response()
    }
}
