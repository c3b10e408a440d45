//! The shared layout, styles and formatting helpers for the admin pages.

use std::sync::OnceLock;

use axum::response::{IntoResponse, Response};
use maud::{DOCTYPE, Markup, html};
use numfmt::{Formatter, Precision};
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{Error, not_found::get_404_not_found_response};

// Link styles
pub const LINK_STYLE: &str = "text-blue-600 hover:text-blue-500 \
    dark:text-blue-500 dark:hover:text-blue-400 underline";

// Button styles
pub const BUTTON_PRIMARY_STYLE: &str = "w-full px-4 py-2 bg-blue-500 \
    dark:bg-blue-600 disabled:bg-blue-700 hover:enabled:bg-blue-600 \
    hover:enabled:dark:bg-blue-700 text-white rounded";

pub const BUTTON_DELETE_STYLE: &str = "text-red-600 hover:text-red-500 \
    dark:text-red-500 dark:hover:text-red-400 underline bg-transparent \
    border-none cursor-pointer";

// Form styles
pub const FORM_CONTAINER_STYLE: &str = "flex flex-col items-center px-6 py-8 \
    mx-auto lg:py-0 max-w-md text-gray-900 dark:text-white";
pub const FORM_LABEL_STYLE: &str = "block mb-2 text-sm font-medium text-gray-900 dark:text-white";
pub const FORM_TEXT_INPUT_STYLE: &str = "block w-full p-2.5 rounded text-sm \
    text-gray-900 dark:text-white disabled:text-gray-500 bg-gray-50 \
    dark:bg-gray-700 border border-gray-300 dark:border-gray-600 \
    dark:placeholder-gray-400 focus:ring-blue-600 focus:border-blue-600 \
    focus:dark:border-blue-500 focus:dark:ring-blue-500";

// Table styles
pub const TABLE_HEADER_STYLE: &str = "text-xs text-gray-700 uppercase \
    bg-gray-50 dark:bg-gray-700 dark:text-gray-400";

pub const TABLE_ROW_STYLE: &str = "bg-white border-b dark:bg-gray-800 dark:border-gray-700";

pub const TABLE_CELL_STYLE: &str = "px-6 py-4";

// Status badge style
pub const BADGE_STYLE: &str = "inline-flex items-center px-2.5 py-0.5 \
    text-xs font-semibold rounded-full";

// Page container
pub const PAGE_CONTAINER_STYLE: &str =
    "flex flex-col items-center px-6 py-8 mx-auto lg:py-5 text-gray-900 dark:text-white";

pub fn base(title: &str, content: &Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en"
        {
            head
            {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " - Commission Ledger" }

                script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4" {}
                script src="https://unpkg.com/htmx.org@2.0.8" {}
                script src="https://unpkg.com/htmx-ext-response-targets@2.0.4" {}
            }

            body
                hx-ext="response-targets"
                class="container max-w-full min-h-screen bg-gray-50 dark:bg-gray-900"
            {
                (content)

                // Alert container for swapped in alerts
                div
                    id="alert-container"
                    class="w-full max-w-md px-4"
                    style="position: fixed; bottom: 1rem; left: 50%; transform: translateX(-50%); z-index: 9999;"
                {}
            }
        }
    }
}

pub fn error_view(title: &str, header: &str, description: &str, fix: &str) -> Markup {
    // Template adapted from https://flowbite.com/blocks/marketing/404/
    let content = html!(
        section class="bg-white dark:bg-gray-900"
        {
            div class="py-8 px-4 mx-auto max-w-screen-xl lg:py-16 lg:px-6"
            {
                div class="mx-auto max-w-screen-sm text-center"
                {
                    h1
                        class="mb-4 text-7xl tracking-tight font-extrabold
                            lg:text-9xl text-blue-600 dark:text-blue-500"
                    {
                        (header)
                    }

                    p
                        class="mb-4 text-3xl md:text-4xl tracking-tight
                            font-bold text-gray-900 dark:text-white"
                    {
                        (description)
                    }

                    p
                        class="mb-4 text-1xl md:text-2xl tracking-tight
                            text-gray-900 dark:text-white"
                    {
                        (fix)
                    }

                    a
                        href="/admin"
                        class="inline-flex text-white bg-blue-600
                            hover:bg-blue-800 font-medium rounded text-sm px-5
                            py-2.5 text-center my-4"
                    {
                        "Back to Dashboard"
                    }
                }
            }
        }
    );

    base(title, &content)
}

impl Error {
    /// Convert the error into a full HTML error page.
    pub fn into_page_response(self) -> Response {
        let status_code = self.status_code();

        if status_code == axum::http::StatusCode::NOT_FOUND {
            return get_404_not_found_response();
        }

        if status_code.is_server_error() {
            tracing::error!("An unexpected error occurred: {self}");
            return (
                status_code,
                error_view(
                    "Internal Server Error",
                    "500",
                    "Sorry, something went wrong.",
                    "Check the server logs for more details.",
                ),
            )
                .into_response();
        }

        (
            status_code,
            error_view(
                "Bad Request",
                status_code.as_str(),
                &self.to_string(),
                "Check your input and try again.",
            ),
        )
            .into_response()
    }
}

pub fn format_currency(number: f64) -> String {
    static POSITIVE_FMT: OnceLock<Option<Formatter>> = OnceLock::new();
    static NEGATIVE_FMT: OnceLock<Option<Formatter>> = OnceLock::new();

    let make_formatter = |symbol: &str| {
        Formatter::currency(symbol)
            .ok()
            .map(|formatter| formatter.precision(Precision::Decimals(2)))
    };

    let formatter = if number < 0.0 {
        NEGATIVE_FMT.get_or_init(|| make_formatter("-$")).as_ref()
    } else {
        POSITIVE_FMT.get_or_init(|| make_formatter("$")).as_ref()
    };

    let mut formatted_string = match formatter {
        // Zero is formatted as "0", so we must specify the formatted string for zero
        Some(_) if number == 0.0 => return "$0.00".to_owned(),
        Some(formatter) => formatter.fmt_string(number.abs()),
        None => return format!("${number:.2}"),
    };

    // numfmt drops trailing zeros, e.g. "12.30" is rendered as "12.3"
    match formatted_string.find('.') {
        Some(point) => {
            let decimals = formatted_string.len() - point - 1;
            formatted_string.extend(std::iter::repeat_n('0', 2usize.saturating_sub(decimals)));
        }
        None => formatted_string.push_str(".00"),
    }

    formatted_string
}

/// Format a commission rate such as 0.015 as a percentage, e.g. "1.5%".
pub fn format_rate(rate: f64) -> String {
    let percentage = format!("{:.4}", rate * 100.0);
    let percentage = percentage.trim_end_matches('0').trim_end_matches('.');

    format!("{percentage}%")
}

const DATE_TIME_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Format `date_time` for tables, e.g. "2025-10-05 12:00:00".
pub fn format_date_time(date_time: OffsetDateTime) -> String {
    date_time
        .format(DATE_TIME_FORMAT)
        .unwrap_or_else(|_| date_time.to_string())
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::{format_currency, format_date_time, format_rate};

    #[test]
    fn formats_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(12.3), "$12.30");
        assert_eq!(format_currency(150.0), "$150.00");
        assert_eq!(format_currency(-5.25), "-$5.25");
    }

    #[test]
    fn formats_rate_as_percentage() {
        assert_eq!(format_rate(0.01), "1%");
        assert_eq!(format_rate(0.015), "1.5%");
        assert_eq!(format_rate(0.0), "0%");
    }

    #[test]
    fn formats_date_time() {
        assert_eq!(
            format_date_time(datetime!(2025-10-05 09:03:07 UTC)),
            "2025-10-05 09:03:07"
        );
    }
}
