//! User accounts

use crate::auth::{hash_password, verify_password, Role};
use crate::{Error, Result};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::info;

/// Account as exposed to handlers (never carries the password hash)
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

#[derive(FromRow)]
struct UserRow {
    id: i32,
    email: String,
    name: Option<String>,
    role: String,
    password_hash: String,
}

impl UserRow {
    fn into_user(self) -> Result<User> {
        Ok(User {
            id: self.id,
            email: self.email,
            name: self.name,
            role: Role::from_str(&self.role)?,
        })
    }
}

/// Emails are matched case-insensitively
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Create an account
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    name: Option<&str>,
    password: &str,
    role: Role,
) -> Result<User> {
    let email = normalize_email(email);
    if email.is_empty() || !email.contains('@') {
        return Err(Error::InvalidInput("a valid email address is required".to_string()));
    }
    if password.len() < 8 {
        return Err(Error::InvalidInput("password must be at least 8 characters".to_string()));
    }

    let row: UserRow = sqlx::query_as(
        r#"
        INSERT INTO users (email, name, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING id, email, name, role, password_hash
        "#,
    )
    .bind(&email)
    .bind(name)
    .bind(hash_password(password))
    .bind(role.as_str())
    .fetch_one(pool)
    .await
    .map_err(Error::from_db)?;

    info!("Created user {} ({})", email, role);
    row.into_user()
}

/// Result of a credential check
#[derive(Debug)]
pub enum LoginOutcome {
    Accepted(User),
    UnknownUser,
    WrongPassword,
}

/// Check credentials
pub async fn authenticate(pool: &PgPool, email: &str, password: &str) -> Result<LoginOutcome> {
    let row: Option<UserRow> = sqlx::query_as(
        "SELECT id, email, name, role, password_hash FROM users WHERE email = $1",
    )
    .bind(normalize_email(email))
    .fetch_optional(pool)
    .await?;

    match row {
        None => Ok(LoginOutcome::UnknownUser),
        Some(row) if verify_password(password, &row.password_hash) => {
            row.into_user().map(LoginOutcome::Accepted)
        }
        Some(_) => Ok(LoginOutcome::WrongPassword),
    }
}

pub async fn get_user(pool: &PgPool, id: i32) -> Result<Option<User>> {
    let row: Option<UserRow> = sqlx::query_as(
        "SELECT id, email, name, role, password_hash FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(UserRow::into_user).transpose()
}
