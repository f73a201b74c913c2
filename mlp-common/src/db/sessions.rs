//! Login sessions
//!
//! The client holds a random token; the database holds only its SHA-256
//! with an expiry. Logging out deletes the row, so a copied cookie stops
//! working immediately.

use crate::auth::{generate_session_token, hash_token};
use crate::db::users::{get_user, User};
use crate::Result;
use chrono::{Duration, NaiveDateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

/// Start a session for `user_id`; returns the cookie token
pub async fn create_session(pool: &PgPool, user_id: i32, ttl: Duration) -> Result<String> {
    purge_expired(pool).await?;

    let token = generate_session_token();
    let expires_at: NaiveDateTime = (Utc::now() + ttl).naive_utc();

    sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;

    debug!("Session created for user {}", user_id);
    Ok(token)
}

/// User behind an unexpired session token
pub async fn session_user(pool: &PgPool, token: &str) -> Result<Option<User>> {
    let user_id: Option<i32> = sqlx::query_scalar(
        "SELECT user_id FROM sessions WHERE token_hash = $1 AND expires_at > $2",
    )
    .bind(hash_token(token))
    .bind(Utc::now().naive_utc())
    .fetch_optional(pool)
    .await?;

    match user_id {
        Some(id) => get_user(pool, id).await,
        None => Ok(None),
    }
}

/// End a session; unknown tokens are ignored
pub async fn delete_session(pool: &PgPool, token: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(())
}

/// Remove expired sessions; returns how many were removed
pub async fn purge_expired(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
        .bind(Utc::now().naive_utc())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
