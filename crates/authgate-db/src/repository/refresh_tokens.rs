//! Refresh token operations

use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::error::DbError;
use crate::models::{NewRefreshToken, RefreshToken};

use super::Database;

impl Database {
    /// Store a refresh token hash
    pub async fn insert_refresh_token(&self, token: NewRefreshToken) -> Result<RefreshToken, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&token.user_id)
        .bind(&token.token_hash)
        .bind(token.expires_at.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::from_insert(e, "refresh token"))?;

        Ok(RefreshToken {
            id: result.get("id"),
            user_id: token.user_id,
            token_hash: token.token_hash,
            expires_at: token.expires_at,
            created_at: now,
            revoked_at: None,
        })
    }

    /// Look up a refresh token by its hash
    pub async fn get_refresh_token_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, user_id, token_hash, expires_at, created_at, revoked_at
            FROM refresh_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| RefreshToken::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Revoke a single refresh token
    ///
    /// Returns `false` when the token was already revoked, so two concurrent
    /// exchanges of the same token cannot both succeed.
    pub async fn revoke_refresh_token(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = ?
            WHERE id = ? AND revoked_at IS NULL
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Revoke every outstanding refresh token of a user
    pub async fn revoke_user_refresh_tokens(&self, user_id: &str) -> Result<u64, DbError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = ?
            WHERE user_id = ? AND revoked_at IS NULL
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete tokens that expired before `now`
    pub async fn delete_expired_refresh_tokens(&self, now: DateTime<Utc>) -> Result<u64, DbError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;
    use chrono::Duration;

    async fn seeded() -> (Database, String) {
        let db = Database::in_memory().await.unwrap();
        let user = db
            .insert_user(NewUser {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();
        (db, user.id)
    }

    fn token(user_id: &str, hash: &str, expires_at: DateTime<Utc>) -> NewRefreshToken {
        NewRefreshToken {
            user_id: user_id.to_string(),
            token_hash: hash.to_string(),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let (db, user_id) = seeded().await;
        let expires_at = Utc::now() + Duration::days(7);

        let stored = db.insert_refresh_token(token(&user_id, "h1", expires_at)).await.unwrap();
        let found = db.get_refresh_token_by_hash("h1").await.unwrap().unwrap();

        assert_eq!(found.id, stored.id);
        assert_eq!(found.user_id, user_id);
        assert_eq!(found.expires_at.timestamp(), expires_at.timestamp());
        assert!(found.revoked_at.is_none());
        assert!(db.get_refresh_token_by_hash("h2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_only_once() {
        let (db, user_id) = seeded().await;
        let stored = db
            .insert_refresh_token(token(&user_id, "h1", Utc::now() + Duration::days(1)))
            .await
            .unwrap();

        assert!(db.revoke_refresh_token(stored.id).await.unwrap());
        assert!(!db.revoke_refresh_token(stored.id).await.unwrap());

        let found = db.get_refresh_token_by_hash("h1").await.unwrap().unwrap();
        assert!(found.revoked_at.is_some());
        assert!(!found.is_active(Utc::now()));
    }

    #[tokio::test]
    async fn test_revoke_user_tokens() {
        let (db, user_id) = seeded().await;
        let expires_at = Utc::now() + Duration::days(1);
        db.insert_refresh_token(token(&user_id, "h1", expires_at)).await.unwrap();
        db.insert_refresh_token(token(&user_id, "h2", expires_at)).await.unwrap();

        assert_eq!(db.revoke_user_refresh_tokens(&user_id).await.unwrap(), 2);
        assert_eq!(db.revoke_user_refresh_tokens(&user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (db, user_id) = seeded().await;
        let now = Utc::now();
        db.insert_refresh_token(token(&user_id, "old", now - Duration::hours(1))).await.unwrap();
        db.insert_refresh_token(token(&user_id, "new", now + Duration::hours(1))).await.unwrap();

        assert_eq!(db.delete_expired_refresh_tokens(now).await.unwrap(), 1);
        assert!(db.get_refresh_token_by_hash("old").await.unwrap().is_none());
        assert!(db.get_refresh_token_by_hash("new").await.unwrap().is_some());
    }
}
