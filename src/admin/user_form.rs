//! Pages and endpoints for creating and editing users.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::Form;
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    admin::AdminState,
    endpoints::{self, format_endpoint},
    html::{
        BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, base,
    },
    navigation::NavBar,
    user::{NewUser, Role, User, UserID, create_user, get_user_by_id, update_user},
};

/// The fields of the user form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFormData {
    pub balance: f64,
    pub commission_rate: f64,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub wallet_address: String,
}

impl Default for UserFormData {
    fn default() -> Self {
        Self::from(NewUser::default())
    }
}

impl From<NewUser> for UserFormData {
    fn from(user: NewUser) -> Self {
        Self {
            balance: user.balance,
            commission_rate: user.commission_rate,
            webhook_url: user.webhook_url.unwrap_or_default(),
            role: user.role,
            wallet_address: user.wallet_address.unwrap_or_default(),
        }
    }
}

impl From<&User> for UserFormData {
    fn from(user: &User) -> Self {
        Self {
            balance: user.balance,
            commission_rate: user.commission_rate,
            webhook_url: user.webhook_url.clone().unwrap_or_default(),
            role: user.role,
            wallet_address: user.wallet_address.clone().unwrap_or_default(),
        }
    }
}

impl UserFormData {
    fn to_new_user(&self) -> NewUser {
        NewUser {
            balance: self.balance,
            commission_rate: self.commission_rate,
            webhook_url: Some(self.webhook_url.clone()),
            role: self.role,
            wallet_address: Some(self.wallet_address.clone()),
        }
    }
}

/// Where the user form is submitted.
#[derive(Debug, Clone, Copy)]
enum FormTarget {
    Create,
    Update(UserID),
}

/// Render the page for creating a user.
pub async fn get_new_user_page() -> Response {
    user_page(
        "Create User",
        endpoints::ADMIN_NEW_USER_VIEW,
        user_form_view(FormTarget::Create, &UserFormData::default(), ""),
    )
    .into_response()
}

/// Handle the create user form.
///
/// Invalid input re-renders the form with an error message and a 400 status.
pub async fn create_user_endpoint(
    State(state): State<AdminState>,
    Form(form): Form<UserFormData>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match create_user(form.to_new_user(), &connection) {
        Ok(user) => {
            tracing::info!("Created user {} with role {}", user.id, user.role);
            (
                HxRedirect(endpoints::ADMIN_USERS_VIEW.to_owned()),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(error) => form_error_response(FormTarget::Create, &form, error),
    }
}

/// Render the page for editing the user `user_id`.
pub async fn get_edit_user_page(
    State(state): State<AdminState>,
    Path(user_id): Path<UserID>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_page_response();
        }
    };

    match get_user_by_id(user_id, &connection) {
        Ok(user) => user_page(
            "Edit User",
            endpoints::ADMIN_EDIT_USER_VIEW,
            user_form_view(FormTarget::Update(user.id), &UserFormData::from(&user), ""),
        )
        .into_response(),
        Err(error) => error.into_page_response(),
    }
}

/// Handle the edit user form.
pub async fn update_user_endpoint(
    State(state): State<AdminState>,
    Path(user_id): Path<UserID>,
    Form(form): Form<UserFormData>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match update_user(user_id, form.to_new_user(), &connection) {
        Ok(user) => {
            tracing::info!("Updated user {}", user.id);
            (
                HxRedirect(endpoints::ADMIN_USERS_VIEW.to_owned()),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(Error::UserNotFound) => Error::UserNotFound.into_alert_response(),
        Err(error) => form_error_response(FormTarget::Update(user_id), &form, error),
    }
}

/// Re-render the form with `error`, or fall back to an alert for errors the admin cannot fix.
fn form_error_response(target: FormTarget, form: &UserFormData, error: Error) -> Response {
    match error {
        Error::InvalidCommissionRate(_)
        | Error::InvalidBalance(_)
        | Error::InvalidWebhookUrl(_) => (
            StatusCode::BAD_REQUEST,
            user_form_view(target, form, &format!("Error: {error}")),
        )
            .into_response(),
        error => {
            tracing::error!("An unexpected error occurred while saving a user: {error}");
            error.into_alert_response()
        }
    }
}

fn user_page(title: &str, active_endpoint: &str, form: Markup) -> Markup {
    let nav_bar = NavBar::new(active_endpoint).into_html();

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            h1 class="text-2xl font-bold my-6" { (title) }
            (form)
        }
    };

    base(title, &content)
}

fn user_form_view(target: FormTarget, form: &UserFormData, error_message: &str) -> Markup {
    let (hx_post, hx_put, submit_text) = match target {
        FormTarget::Create => (Some(endpoints::ADMIN_USERS_VIEW.to_owned()), None, "Create User"),
        FormTarget::Update(user_id) => (
            None,
            Some(format_endpoint(endpoints::ADMIN_USER, user_id.as_i64())),
            "Save Changes",
        ),
    };

    html! {
        form
            hx-post=[hx_post]
            hx-put=[hx_put]
            hx-target="this"
            hx-target-error="this"
            hx-swap="outerHTML"
            class="w-full space-y-4 md:space-y-6"
        {
            div
            {
                label for="balance" class=(FORM_LABEL_STYLE) { "Balance" }

                input
                    id="balance"
                    type="number"
                    name="balance"
                    step="0.01"
                    required
                    value=(form.balance)
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="commission_rate" class=(FORM_LABEL_STYLE) { "Commission Rate" }

                input
                    id="commission_rate"
                    type="number"
                    name="commission_rate"
                    step="any"
                    min="0"
                    required
                    value=(form.commission_rate)
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="webhook_url" class=(FORM_LABEL_STYLE) { "Webhook URL" }

                input
                    id="webhook_url"
                    type="url"
                    name="webhook_url"
                    placeholder="https://example.com/webhook"
                    value=(form.webhook_url)
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="role" class=(FORM_LABEL_STYLE) { "Role" }

                select id="role" name="role" class=(FORM_TEXT_INPUT_STYLE)
                {
                    @for role in [Role::User, Role::Admin] {
                        option value=(role.as_str()) selected[role == form.role] { (role) }
                    }
                }
            }

            div
            {
                label for="wallet_address" class=(FORM_LABEL_STYLE) { "Wallet Address" }

                input
                    id="wallet_address"
                    type="text"
                    name="wallet_address"
                    value=(form.wallet_address)
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            @if !error_message.is_empty() {
                p class="text-red-600 dark:text-red-400" { (error_message) }
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { (submit_text) }
        }
    }
}


#[cfg(test)]
mod create_user_endpoint_tests {
    use axum::{extract::State, http::StatusCode};
    use axum_extra::extract::Form;

    use crate::{
        admin::{AdminState, create_user_endpoint, user_form::UserFormData},
        endpoints,
        test_utils::{
            assert_hx_redirect, assert_valid_html, get_test_connection, must_get_form,
            parse_html_fragment,
        },
        user::{Role, get_all_users},
    };

    #[tokio::test]
    async fn can_create_user() {
        let state = AdminState::new(get_test_connection());
        let form = UserFormData {
            balance: 12.5,
            commission_rate: 0.02,
            webhook_url: "https://hooks.example.com/cb".to_owned(),
            role: Role::Admin,
            wallet_address: "".to_owned(),
        };

        let response = create_user_endpoint(State(state.clone()), Form(form)).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::ADMIN_USERS_VIEW);

        let users = get_all_users(&state.db_connection.lock().unwrap()).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].balance, 12.5);
        assert_eq!(users[0].commission_rate, 0.02);
        assert_eq!(
            users[0].webhook_url.as_deref(),
            Some("https://hooks.example.com/cb")
        );
        assert_eq!(users[0].role, Role::Admin);
        assert_eq!(users[0].wallet_address, None);
    }

    #[tokio::test]
    async fn negative_rate_re_renders_form_with_400() {
        let state = AdminState::new(get_test_connection());
        let form = UserFormData {
            commission_rate: -0.5,
            ..Default::default()
        };

        let response = create_user_endpoint(State(state.clone()), Form(form)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = parse_html_fragment(response).await;
        assert_valid_html(&html);
        let form = must_get_form(&html);
        let text = form.text().collect::<String>();
        assert!(text.contains("-0.5 is not a valid commission rate"));

        let users = get_all_users(&state.db_connection.lock().unwrap()).unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn infinite_balance_re_renders_form_with_400() {
        let state = AdminState::new(get_test_connection());
        let form = UserFormData {
            balance: f64::INFINITY,
            ..Default::default()
        };

        let response = create_user_endpoint(State(state.clone()), Form(form)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let html = parse_html_fragment(response).await;
        let form = must_get_form(&html);
        let text = form.text().collect::<String>();
        assert!(text.contains("inf is not a valid balance"));

        let users = get_all_users(&state.db_connection.lock().unwrap()).unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn invalid_webhook_url_re_renders_form_with_400() {
        let state = AdminState::new(get_test_connection());
        let form = UserFormData {
            webhook_url: "ftp://files.example.com".to_owned(),
            ..Default::default()
        };

        let response = create_user_endpoint(State(state), Form(form)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[cfg(test)]
mod edit_user_tests {
    use axum::{
        extract::{Path, State},
        http::StatusCode,
    };
    use axum_extra::extract::Form;

    use crate::{
        admin::{AdminState, get_edit_user_page, update_user_endpoint, user_form::UserFormData},
        endpoints::{self, format_endpoint},
        test_utils::{
            assert_form_input_with_value, assert_hx_endpoint, assert_hx_redirect,
            assert_status_ok, assert_valid_html, get_test_connection, must_get_form,
            parse_html_document,
        },
        user::{NewUser, UserID, create_user, get_user_by_id},
    };

    #[tokio::test]
    async fn edit_page_shows_current_values() {
        let conn = get_test_connection();
        let user = create_user(
            NewUser::default()
                .commission_rate(0.25)
                .wallet_address(Some("wallet-123")),
            &conn,
        )
        .unwrap();
        let state = AdminState::new(conn);

        let response = get_edit_user_page(State(state), Path(user.id)).await;

        assert_status_ok(&response);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        let form = must_get_form(&html);
        assert_hx_endpoint(
            &form,
            &format_endpoint(endpoints::ADMIN_USER, user.id.as_i64()),
            "hx-put",
        );
        assert_form_input_with_value(&form, "commission_rate", "0.25");
        assert_form_input_with_value(&form, "wallet_address", "wallet-123");
    }

    #[tokio::test]
    async fn edit_page_for_missing_user_is_404() {
        let state = AdminState::new(get_test_connection());

        let response = get_edit_user_page(State(state), Path(UserID::new(99))).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn can_update_user() {
        let conn = get_test_connection();
        let user = create_user(NewUser::default(), &conn).unwrap();
        let state = AdminState::new(conn);
        let form = UserFormData {
            balance: 3.0,
            commission_rate: 0.05,
            webhook_url: "http://localhost:9000/hook".to_owned(),
            ..Default::default()
        };

        let response = update_user_endpoint(State(state.clone()), Path(user.id), Form(form)).await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::ADMIN_USERS_VIEW);
        let updated = get_user_by_id(user.id, &state.db_connection.lock().unwrap()).unwrap();
        assert_eq!(updated.balance, 3.0);
        assert_eq!(updated.commission_rate, 0.05);
        assert_eq!(
            updated.webhook_url.as_deref(),
            Some("http://localhost:9000/hook")
        );
    }

    #[tokio::test]
    async fn update_missing_user_is_404() {
        let state = AdminState::new(get_test_connection());

        let response = update_user_endpoint(
            State(state),
            Path(UserID::new(42)),
            Form(UserFormData::default()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
