//! Code for creating the user table and managing users in the database.

use std::{fmt::Display, str::FromStr};

use reqwest::Url;
use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The commission rate given to users when none is specified.
pub const DEFAULT_COMMISSION_RATE: f64 = 0.01;

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from transaction IDs, leading to better compile time
/// errors when the two are mixed up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(transparent)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// What a user is allowed to do in the admin surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Manages other users and their transactions.
    Admin,
    /// Owns transactions.
    #[default]
    User,
}

impl Role {
    /// The name stored in the database and shown in the admin UI.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role \"{other}\"")),
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

/// A user of the application, i.e. the owner of transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The user's balance, updated by settlement outside this service.
    pub balance: f64,
    /// The fraction of each transaction's amount charged as commission.
    pub commission_rate: f64,
    /// Where to send notifications when one of the user's transactions changes status.
    pub webhook_url: Option<String>,
    /// Whether the user is an admin.
    pub role: Role,
    /// An opaque wallet address for payouts.
    pub wallet_address: Option<String>,
}

/// The fields needed to create or update a user.
///
/// Use [NewUser::validate] to check the fields before they go near the database.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// See [User::balance].
    pub balance: f64,
    /// See [User::commission_rate].
    pub commission_rate: f64,
    /// See [User::webhook_url].
    pub webhook_url: Option<String>,
    /// See [User::role].
    pub role: Role,
    /// See [User::wallet_address].
    pub wallet_address: Option<String>,
}

impl Default for NewUser {
    fn default() -> Self {
        Self {
            balance: 0.0,
            commission_rate: DEFAULT_COMMISSION_RATE,
            webhook_url: None,
            role: Role::User,
            wallet_address: None,
        }
    }
}

impl NewUser {
    /// Set the commission rate.
    pub fn commission_rate(mut self, commission_rate: f64) -> Self {
        self.commission_rate = commission_rate;
        self
    }

    /// Set the webhook URL.
    pub fn webhook_url(mut self, webhook_url: Option<&str>) -> Self {
        self.webhook_url = webhook_url.map(ToOwned::to_owned);
        self
    }

    /// Set the role.
    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Set the wallet address.
    pub fn wallet_address(mut self, wallet_address: Option<&str>) -> Self {
        self.wallet_address = wallet_address.map(ToOwned::to_owned);
        self
    }

    /// Check the fields of the user.
    ///
    /// Blank strings for the optional fields are treated as missing values.
    ///
    /// # Errors
    /// Returns a:
    /// - [Error::InvalidCommissionRate] if the commission rate is negative or not finite,
    /// - [Error::InvalidBalance] if the balance is not finite,
    /// - [Error::InvalidWebhookUrl] if the webhook URL is not an absolute http(s) URL.
    pub fn validate(mut self) -> Result<Self, Error> {
        if !self.commission_rate.is_finite() || self.commission_rate < 0.0 {
            return Err(Error::InvalidCommissionRate(self.commission_rate));
        }

        if !self.balance.is_finite() {
            return Err(Error::InvalidBalance(self.balance));
        }

        self.webhook_url = non_blank(self.webhook_url);
        self.wallet_address = non_blank(self.wallet_address);

        if let Some(webhook_url) = &self.webhook_url {
            validate_webhook_url(webhook_url)?;
        }

        Ok(self)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn validate_webhook_url(webhook_url: &str) -> Result<(), Error> {
    match Url::parse(webhook_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(()),
        _ => Err(Error::InvalidWebhookUrl(webhook_url.to_owned())),
    }
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                balance REAL NOT NULL DEFAULT 0.0,
                commission_rate REAL NOT NULL DEFAULT 0.01 CHECK (commission_rate >= 0.0),
                webhook_url TEXT,
                role TEXT NOT NULL DEFAULT 'user',
                wallet_address TEXT
                )",
        (),
    )?;

    Ok(())
}

/// Insert a new user into the database.
///
/// # Errors
///
/// Returns a validation error (see [NewUser::validate]) or a [Error::SqlError] if an SQL related
/// error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let new_user = new_user.validate()?;

    let user = connection
        .prepare(
            "INSERT INTO user (balance, commission_rate, webhook_url, role, wallet_address)
             VALUES (?1, ?2, ?3, ?4, ?5)
             RETURNING id, balance, commission_rate, webhook_url, role, wallet_address",
        )?
        .query_row(
            (
                new_user.balance,
                new_user.commission_rate,
                new_user.webhook_url,
                new_user.role,
                new_user.wallet_address,
            ),
            map_user_row,
        )?;

    Ok(user)
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return a:
/// - [Error::UserNotFound] if `user_id` does not belong to a user,
/// - [Error::SqlError] if there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(
            "SELECT id, balance, commission_rate, webhook_url, role, wallet_address
             FROM user WHERE id = :id",
        )?
        .query_row(&[(":id", &user_id.as_i64())], map_user_row)
        .map_err(|error| match Error::from(error) {
            Error::NotFound => Error::UserNotFound,
            error => error,
        })
}

/// Get all users ordered by ID.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_all_users(connection: &Connection) -> Result<Vec<User>, Error> {
    connection
        .prepare(
            "SELECT id, balance, commission_rate, webhook_url, role, wallet_address
             FROM user ORDER BY id ASC",
        )?
        .query_map([], map_user_row)?
        .map(|maybe_user| maybe_user.map_err(Error::from))
        .collect()
}

/// Overwrite the fields of the user `user_id`.
///
/// Existing transactions keep the commission they were created with.
///
/// # Errors
///
/// Returns a validation error (see [NewUser::validate]), [Error::UserNotFound] if the user does
/// not exist, or [Error::SqlError] if an SQL related error occurred.
pub fn update_user(user_id: UserID, fields: NewUser, connection: &Connection) -> Result<User, Error> {
    let fields = fields.validate()?;

    connection
        .prepare(
            "UPDATE user
             SET balance = ?1, commission_rate = ?2, webhook_url = ?3, role = ?4, wallet_address = ?5
             WHERE id = ?6
             RETURNING id, balance, commission_rate, webhook_url, role, wallet_address",
        )?
        .query_row(
            (
                fields.balance,
                fields.commission_rate,
                fields.webhook_url,
                fields.role,
                fields.wallet_address,
                user_id.as_i64(),
            ),
            map_user_row,
        )
        .map_err(|error| match Error::from(error) {
            Error::NotFound => Error::UserNotFound,
            error => error,
        })
}

/// Delete the user `user_id` and, through the foreign key, all of their transactions.
///
/// # Errors
///
/// Returns [Error::UserNotFound] if the user does not exist, or [Error::SqlError] if an SQL
/// related error occurred.
pub fn delete_user(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected =
        connection.execute("DELETE FROM user WHERE id = ?1", (user_id.as_i64(),))?;

    if rows_affected == 0 {
        return Err(Error::UserNotFound);
    }

    Ok(())
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get(0))
        .map_err(|error| error.into())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: UserID::new(row.get(0)?),
        balance: row.get(1)?,
        commission_rate: row.get(2)?,
        webhook_url: row.get(3)?,
        role: row.get(4)?,
        wallet_address: row.get(5)?,
    })
}
