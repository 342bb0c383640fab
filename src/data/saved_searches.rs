//! Saved search persistence and validation.

use anyhow::Result;
use sqlx::PgPool;
use thiserror::Error;

use crate::data::models::SavedSearch;

#[derive(Debug, Error)]
pub enum SavedSearchError {
    #[error("search text must be at least {0} characters")]
    TooShort(usize),
    #[error("search text must be at most {0} characters")]
    TooLong(usize),
    #[error("saved search limit of {0} reached")]
    LimitReached(i64),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// An enabled saved search joined to its notifiable owner.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActiveSearch {
    pub search_id: i64,
    pub search_text: String,
    pub user_id: i64,
    pub email: String,
    pub display_name: String,
}

const SEARCH_SELECT: &str =
    "SELECT id, user_id, search_text, enabled, created_at FROM saved_searches";

/// Trim a search text and check its length bounds.
pub fn validate_search_text(
    search_text: &str,
    min_length: usize,
    max_length: usize,
) -> Result<&str, SavedSearchError> {
    let text = search_text.trim();
    if text.chars().count() < min_length {
        return Err(SavedSearchError::TooShort(min_length));
    }
    if text.chars().count() > max_length {
        return Err(SavedSearchError::TooLong(max_length));
    }
    Ok(text)
}

/// Create a saved search after trimming and validating the text.
pub async fn create(
    pool: &PgPool,
    user_id: i64,
    search_text: &str,
    min_length: usize,
    max_length: usize,
    max_per_user: i64,
) -> Result<SavedSearch, SavedSearchError> {
    let text = validate_search_text(search_text, min_length, max_length)?;

    let existing: i64 = sqlx::query_scalar("SELECT count(*) FROM saved_searches WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    if existing >= max_per_user {
        return Err(SavedSearchError::LimitReached(max_per_user));
    }

    let search = sqlx::query_as(
        "INSERT INTO saved_searches (user_id, search_text) VALUES ($1, $2) \
         RETURNING id, user_id, search_text, enabled, created_at",
    )
    .bind(user_id)
    .bind(text)
    .fetch_one(pool)
    .await?;
    Ok(search)
}

/// All saved searches belonging to one user.
pub async fn list_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<SavedSearch>> {
    let rows = sqlx::query_as(&format!(
        "{SEARCH_SELECT} WHERE user_id = $1 ORDER BY created_at"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Enable or disable a search. Returns false when the search does not belong
/// to the user.
pub async fn set_enabled(pool: &PgPool, user_id: i64, search_id: i64, enabled: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE saved_searches SET enabled = $3 WHERE id = $2 AND user_id = $1")
        .bind(user_id)
        .bind(search_id)
        .bind(enabled)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Delete a search. Returns false when the search does not belong to the user.
pub async fn delete(pool: &PgPool, user_id: i64, search_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM saved_searches WHERE id = $2 AND user_id = $1")
        .bind(user_id)
        .bind(search_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Enabled searches whose owners are active, not soft-deleted, and accept
/// email notifications. Ordered by user then creation time so the matcher's
/// per-user grouping is stable.
pub async fn list_active_with_users(pool: &PgPool) -> Result<Vec<ActiveSearch>> {
    let rows = sqlx::query_as(
        "SELECT s.id AS search_id, s.search_text, u.id AS user_id, u.email, u.display_name \
         FROM saved_searches s \
         JOIN users u ON u.id = s.user_id \
         JOIN account_statuses st ON st.id = u.status_id \
         WHERE s.enabled \
           AND u.deleted_at IS NULL \
           AND u.email_notifications \
           AND st.code = 'active' \
         ORDER BY u.id, s.created_at",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_text_is_trimmed_and_bounded() {
        assert_eq!(validate_search_text("  fraud  ", 3, 100).unwrap(), "fraud");
        assert!(matches!(
            validate_search_text("ab", 3, 100),
            Err(SavedSearchError::TooShort(3))
        ));
        assert!(matches!(
            validate_search_text(&"x".repeat(101), 3, 100),
            Err(SavedSearchError::TooLong(100))
        ));
        // Whitespace does not count toward the minimum.
        assert!(matches!(
            validate_search_text("  a  ", 3, 100),
            Err(SavedSearchError::TooShort(3))
        ));
    }
}
