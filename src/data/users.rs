//! User accounts at the API boundary: creation, lookup, and status
//! transitions.
//!
//! Status changes only happen through [`transition_status`], which appends to
//! `user_status_history` in the same transaction. There is no generic update
//! path that can touch `status_id`.

use anyhow::{Context, Result, anyhow};
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use sqlx::PgPool;

use crate::data::models::{StatusHistoryEntry, User};

const USER_SELECT: &str = "SELECT u.id, u.email, u.display_name, u.password_hash, \
            st.code AS status, u.email_notifications, u.created_at, u.deleted_at \
     FROM users u JOIN account_statuses st ON st.id = u.status_id";

/// Hash a password with the default Argon2id parameters.
pub fn hash_password(password: &str) -> Result<String> {
    use argon2::PasswordHasher;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
pub fn verify_password(password_hash: &str, password: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(password_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Create a user in `pending` status with the `member` role.
///
/// The initial status lands in the audit trail like any other transition.
pub async fn create(
    pool: &PgPool,
    email: &str,
    display_name: &str,
    password: &str,
) -> Result<User> {
    let password_hash = hash_password(password)?;

    let mut tx = pool.begin().await?;

    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (email, display_name, password_hash, status_id) \
         VALUES ($1, $2, $3, (SELECT id FROM account_statuses WHERE code = 'pending')) \
         RETURNING id",
    )
    .bind(email)
    .bind(display_name)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .context("failed to insert user")?;

    sqlx::query(
        "INSERT INTO user_status_history (user_id, status_id, notes) \
         VALUES ($1, (SELECT id FROM account_statuses WHERE code = 'pending'), 'account created')",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO user_roles (user_id, role_id) \
         SELECT $1, id FROM roles WHERE name = 'member'",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    get(pool, user_id)
        .await?
        .ok_or_else(|| anyhow!("user {user_id} missing after insert"))
}

pub async fn get(pool: &PgPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query_as(&format!("{USER_SELECT} WHERE u.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query_as(&format!("{USER_SELECT} WHERE lower(u.email) = lower($1)"))
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// All users, newest first.
pub async fn list(pool: &PgPool) -> Result<Vec<User>> {
    let rows = sqlx::query_as(&format!("{USER_SELECT} ORDER BY u.created_at DESC"))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Move a user to a new account status, appending to the audit trail in the
/// same transaction. Returns false when the user does not exist (or is
/// soft-deleted) or the status code is unknown.
pub async fn transition_status(
    pool: &PgPool,
    user_id: i64,
    status_code: &str,
    changed_by: Option<i64>,
    notes: &str,
) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let status_id: Option<i32> =
        sqlx::query_scalar("SELECT id FROM account_statuses WHERE code = $1")
            .bind(status_code)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(status_id) = status_id else {
        return Ok(false);
    };

    let updated = sqlx::query(
        "UPDATE users SET status_id = $2 WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(status_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO user_status_history (user_id, status_id, changed_by, notes) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(user_id)
    .bind(status_id)
    .bind(changed_by)
    .bind(notes)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Status audit trail for one user, newest first.
pub async fn status_history(pool: &PgPool, user_id: i64) -> Result<Vec<StatusHistoryEntry>> {
    let rows = sqlx::query_as(
        "SELECT st.code AS status, h.changed_by, h.notes, h.changed_at \
         FROM user_status_history h \
         JOIN account_statuses st ON st.id = h.status_id \
         WHERE h.user_id = $1 ORDER BY h.changed_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Role names assigned to a user.
pub async fn roles_for(pool: &PgPool, user_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query_scalar(
        "SELECT r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
         WHERE ur.user_id = $1 ORDER BY r.name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Capability names granted to a user through role membership.
pub async fn capabilities_for(pool: &PgPool, user_id: i64) -> Result<Vec<String>> {
    let rows = sqlx::query_scalar(
        "SELECT DISTINCT c.name \
         FROM user_roles ur \
         JOIN role_capabilities rc ON rc.role_id = ur.role_id \
         JOIN capabilities c ON c.id = rc.capability_id \
         WHERE ur.user_id = $1 ORDER BY c.name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Issue a password reset token valid for `ttl`.
pub async fn create_password_reset_token(
    pool: &PgPool,
    user_id: i64,
    ttl: chrono::Duration,
) -> Result<String> {
    let token: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect();
    let expires_at: DateTime<Utc> = Utc::now() + ttl;

    sqlx::query(
        "INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)",
    )
    .bind(&token)
    .bind(user_id)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse battery staple").unwrap();
        assert!(verify_password(&hash, "correct horse battery staple"));
        assert!(!verify_password(&hash, "wrong password"));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }
}
