//! Role and membership operations

use chrono::Utc;

use crate::error::DbError;
use crate::models::{Role, UserWithRoles};
use crate::repository::Database;

impl Database {
    // ==================== Role Operations ====================

    /// Create every known role that does not exist yet
    pub async fn ensure_roles(&self) -> Result<(), DbError> {
        let now = Utc::now().to_rfc3339();
        for role in Role::ALL {
            sqlx::query("INSERT OR IGNORE INTO roles (name, created_at) VALUES (?, ?)")
                .bind(role.as_str())
                .bind(&now)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// List role names present in the store
    pub async fn list_roles(&self) -> Result<Vec<String>, DbError> {
        let names: Vec<(String,)> = sqlx::query_as("SELECT name FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names.into_iter().map(|(name,)| name).collect())
    }

    /// Add a user to a role. Adding an existing membership is a no-op.
    pub async fn add_user_to_role(&self, user_id: &str, role: Role) -> Result<(), DbError> {
        if self.get_user_by_id(user_id).await?.is_none() {
            return Err(DbError::NotFound(format!("User: {}", user_id)));
        }

        self.ensure_roles().await?;

        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_name) VALUES (?, ?)")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Role names the user is a member of, sorted
    pub async fn get_user_roles(&self, user_id: &str) -> Result<Vec<String>, DbError> {
        let names: Vec<(String,)> = sqlx::query_as(
            "SELECT role_name FROM user_roles WHERE user_id = ? ORDER BY role_name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names.into_iter().map(|(name,)| name).collect())
    }

    /// Get a user by ID together with its roles
    pub async fn get_user_with_roles(&self, user_id: &str) -> Result<Option<UserWithRoles>, DbError> {
        let Some(user) = self.get_user_by_id(user_id).await? else {
            return Ok(None);
        };
        let roles = self.get_user_roles(&user.id).await?;
        Ok(Some(UserWithRoles { user, roles }))
    }
}
