//! The admin landing page with summary figures.

use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use time::OffsetDateTime;

use crate::{
    Error,
    admin::AdminState,
    endpoints,
    html::{PAGE_CONTAINER_STYLE, base, format_currency},
    navigation::NavBar,
    timezone::local_day_bounds,
    transaction::{
        TransactionStatus, TransactionTotals, count_transactions, count_transactions_with_status,
        total_transactions_created_between,
    },
    user::count_users,
};

/// The figures shown on the dashboard.
#[derive(Debug, Clone, PartialEq)]
struct DashboardSummary {
    user_count: u32,
    transaction_count: u32,
    pending_count: u32,
    /// Totals over the transactions created on the current local calendar day.
    today: TransactionTotals,
}

fn build_summary(
    local_timezone: &str,
    now: OffsetDateTime,
    connection: &Connection,
) -> Result<DashboardSummary, Error> {
    let (start, end) = local_day_bounds(local_timezone, now)?;

    Ok(DashboardSummary {
        user_count: count_users(connection)?,
        transaction_count: count_transactions(connection)?,
        pending_count: count_transactions_with_status(TransactionStatus::Pending, connection)?,
        today: total_transactions_created_between(start, end, connection)?,
    })
}

/// Render the dashboard with user and transaction counts and today's totals.
pub async fn get_dashboard_page(State(state): State<AdminState>) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_page_response();
        }
    };

    match build_summary(&state.local_timezone, OffsetDateTime::now_utc(), &connection) {
        Ok(summary) => dashboard_view(&summary).into_response(),
        Err(error) => {
            tracing::error!("could not build the dashboard summary: {error}");
            error.into_page_response()
        }
    }
}

fn stat_card(id: &str, label: &str, value: &str) -> Markup {
    html! {
        div
            id=(id)
            class="p-6 bg-white border border-gray-200 rounded-lg shadow-sm
            dark:bg-gray-800 dark:border-gray-700"
        {
            p class="text-sm text-gray-500 dark:text-gray-400" { (label) }
            p class="text-3xl font-bold" { (value) }
        }
    }
}

fn dashboard_view(summary: &DashboardSummary) -> Markup {
    let nav_bar = NavBar::new(endpoints::ADMIN_DASHBOARD_VIEW).into_html();

    let content = html! {
        (nav_bar)

        div class=(PAGE_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold mb-6" { "Dashboard" }

            section class="grid grid-cols-1 md:grid-cols-3 gap-4 w-full max-w-4xl"
            {
                (stat_card("user-count", "Users", &summary.user_count.to_string()))
                (stat_card("transaction-count", "Transactions", &summary.transaction_count.to_string()))
                (stat_card("pending-count", "Pending", &summary.pending_count.to_string()))
            }

            h2 class="text-xl font-semibold mt-8 mb-4" { "Today" }

            section class="grid grid-cols-1 md:grid-cols-3 gap-4 w-full max-w-4xl"
            {
                (stat_card("today-count", "Transactions", &summary.today.count.to_string()))
                (stat_card("today-amount", "Total amount", &format_currency(summary.today.amount)))
                (stat_card("today-commission", "Total commission", &format_currency(summary.today.commission)))
            }
        }
    };

    base("Dashboard", &content)
}

#[cfg(test)]
mod tests {
    use axum::extract::State;
    use scraper::{Html, Selector};
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::{
        admin::{AdminState, get_dashboard_page},
        test_utils::{
            assert_content_type, assert_status_ok, assert_valid_html, get_test_connection,
            parse_html_document,
        },
        transaction::{TransactionTotals, cancel_transaction, create_transaction},
        user::{NewUser, create_user},
    };

    use super::build_summary;

    fn card_value(html: &Html, id: &str) -> String {
        let selector = Selector::parse(&format!("#{id} p:last-child")).unwrap();

        html.select(&selector)
            .next()
            .unwrap_or_else(|| panic!("No card with id {id}"))
            .text()
            .collect::<String>()
    }

    #[test]
    fn summary_counts_and_totals_today() {
        let now = datetime!(2025-10-05 12:00:00 UTC);
        let conn = get_test_connection();
        let user = create_user(NewUser::default().commission_rate(0.5), &conn).unwrap();
        create_user(NewUser::default(), &conn).unwrap();
        create_transaction(user.id, 100.0, now - Duration::hours(1), &conn).unwrap();
        create_transaction(user.id, 50.0, now - Duration::hours(2), &conn).unwrap();
        let canceled = create_transaction(user.id, 1000.0, now, &conn).unwrap();
        cancel_transaction(canceled.id, &conn).unwrap();
        // Yesterday.
        create_transaction(user.id, 7.0, now - Duration::days(1), &conn).unwrap();

        let summary = build_summary("Etc/UTC", now, &conn).unwrap();

        assert_eq!(summary.user_count, 2);
        assert_eq!(summary.transaction_count, 4);
        assert_eq!(summary.pending_count, 3);
        assert_eq!(
            summary.today,
            TransactionTotals {
                count: 2,
                amount: 150.0,
                commission: 75.0,
            }
        );
    }

    #[tokio::test]
    async fn renders_dashboard() {
        let conn = get_test_connection();
        let user = create_user(NewUser::default(), &conn).unwrap();
        create_transaction(user.id, 20.0, OffsetDateTime::now_utc(), &conn).unwrap();
        let state = AdminState::new(conn);

        let response = get_dashboard_page(State(state)).await;

        assert_status_ok(&response);
        assert_content_type(&response, "text/html; charset=utf-8");
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        assert_eq!(card_value(&html, "user-count"), "1");
        assert_eq!(card_value(&html, "transaction-count"), "1");
        assert_eq!(card_value(&html, "pending-count"), "1");
        assert_eq!(card_value(&html, "today-amount"), "$20.00");
    }
}
