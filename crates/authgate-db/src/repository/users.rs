//! User operations

use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{NewUser, Role, User, UserWithRoles};
use crate::repository::Database;

impl Database {
    // ==================== User Operations ====================

    /// Insert a new user without any role membership
    pub async fn insert_user(&self, user: NewUser) -> Result<User, DbError> {
        let mut tx = self.pool.begin().await?;
        let created = Self::insert_user_tx(&mut tx, user).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// Insert a new user and assign it a single role, atomically
    ///
    /// All known roles are created first so that a freshly initialised store
    /// ends up with both `ADMIN` and `USER` after the first registration.
    pub async fn create_user_with_role(&self, user: NewUser, role: Role) -> Result<User, DbError> {
        let mut tx = self.pool.begin().await?;

        let now = Utc::now().to_rfc3339();
        for known in Role::ALL {
            sqlx::query("INSERT OR IGNORE INTO roles (name, created_at) VALUES (?, ?)")
                .bind(known.as_str())
                .bind(&now)
                .execute(&mut *tx)
                .await?;
        }

        let created = Self::insert_user_tx(&mut tx, user).await?;

        sqlx::query("INSERT INTO user_roles (user_id, role_name) VALUES (?, ?)")
            .bind(&created.id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn insert_user_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        user: NewUser,
    ) -> Result<User, DbError> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|e| DbError::from_insert(e, format!("User '{}' already exists", user.username)))?;

        Ok(User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a user by username (case-insensitive)
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, created_at, updated_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all users
    pub async fn list_users(&self) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, username, email, password_hash, created_at, updated_at
            FROM users
            ORDER BY username
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// List all users with their role memberships
    pub async fn list_users_with_roles(&self) -> Result<Vec<UserWithRoles>, DbError> {
        let users = self.list_users().await?;

        let memberships: Vec<(String, String)> = sqlx::query_as(
            "SELECT user_id, role_name FROM user_roles ORDER BY role_name",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_user: HashMap<String, Vec<String>> = HashMap::new();
        for (user_id, role) in memberships {
            by_user.entry(user_id).or_default().push(role);
        }

        Ok(users
            .into_iter()
            .map(|user| {
                let roles = by_user.remove(&user.id).unwrap_or_default();
                UserWithRoles { user, roles }
            })
            .collect())
    }

    /// Update user password
    pub async fn update_user_password(&self, id: &str, password_hash: &str) -> Result<bool, DbError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(password_hash)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup_user() {
        let db = Database::in_memory().await.unwrap();

        let user = db.insert_user(new_user("alice")).await.unwrap();
        assert!(!user.id.is_empty());

        let by_name = db.get_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_name.email, "alice@example.com");

        let by_id = db.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");

        assert!(db.get_user_by_username("bob").await.unwrap().is_none());
        assert!(db.get_user_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_username_uniqueness_is_case_insensitive() {
        let db = Database::in_memory().await.unwrap();

        db.insert_user(new_user("alice")).await.unwrap();
        let err = db.insert_user(new_user("ALICE")).await.unwrap_err();
        assert!(matches!(err, DbError::Duplicate(_)));

        let found = db.get_user_by_username("Alice").await.unwrap();
        assert_eq!(found.map(|u| u.username), Some("alice".to_string()));
    }

    #[tokio::test]
    async fn test_create_user_with_role_creates_both_roles() {
        let db = Database::in_memory().await.unwrap();

        let user = db.create_user_with_role(new_user("alice"), Role::User).await.unwrap();

        assert_eq!(db.get_user_roles(&user.id).await.unwrap(), vec!["USER"]);
        assert_eq!(db.list_roles().await.unwrap(), vec!["ADMIN", "USER"]);
    }

    #[tokio::test]
    async fn test_duplicate_registration_leaves_no_partial_state() {
        let db = Database::in_memory().await.unwrap();

        db.create_user_with_role(new_user("alice"), Role::User).await.unwrap();
        let err = db
            .create_user_with_role(new_user("alice"), Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Duplicate(_)));

        let users = db.list_users_with_roles().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].roles, vec!["USER"]);
    }

    #[tokio::test]
    async fn test_list_users_with_roles() {
        let db = Database::in_memory().await.unwrap();

        let admin = db.create_user_with_role(new_user("root"), Role::Admin).await.unwrap();
        db.create_user_with_role(new_user("alice"), Role::User).await.unwrap();
        db.add_user_to_role(&admin.id, Role::User).await.unwrap();

        let users = db.list_users_with_roles().await.unwrap();
        let names: Vec<_> = users.iter().map(|u| u.user.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "root"]);
        assert_eq!(users[0].roles, vec!["USER"]);
        assert_eq!(users[1].roles, vec!["ADMIN", "USER"]);
    }

    #[tokio::test]
    async fn test_update_user_password() {
        let db = Database::in_memory().await.unwrap();
        let user = db.insert_user(new_user("alice")).await.unwrap();

        assert!(db.update_user_password(&user.id, "new-hash").await.unwrap());
        assert!(!db.update_user_password("missing", "new-hash").await.unwrap());

        let reloaded = db.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.password_hash, "new-hash");
    }
}
