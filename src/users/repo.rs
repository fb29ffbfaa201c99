use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserChanges, UserFilter};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already in use")]
    DuplicateEmail,
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::DuplicateEmail;
            }
        }
        StoreError::Database(err)
    }
}

/// Persistence boundary for user records.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;
    /// Returns `None` if no user has this id.
    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError>;
    /// Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
    /// Users ordered by registration date, then id.
    async fn list(
        &self,
        filter: &UserFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, StoreError>;
    async fn count(&self, filter: &UserFilter) -> Result<i64, StoreError>;
    async fn registered_since(&self, since: OffsetDateTime) -> Result<Vec<Uuid>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Builds an `ILIKE` pattern that matches `needle` literally anywhere.
fn contains_pattern(needle: &Option<String>) -> Option<String> {
    needle.as_ref().map(|n| {
        let escaped = n
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{escaped}%")
    })
}

const USER_COLUMNS: &str = "id, name, email, password_hash, role, registration_date";

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let updated = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name  = COALESCE($2, name),
                   email = COALESCE($3, email),
                   role  = COALESCE($4, role)
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.role)
        .fetch_optional(&self.db)
        .await?;
        Ok(updated)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        filter: &UserFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
              FROM users
             WHERE ($1::text IS NULL OR name ILIKE $1)
               AND ($2::text IS NULL OR email ILIKE $2)
               AND ($3::user_role IS NULL OR role = $3)
             ORDER BY registration_date ASC, id ASC
             LIMIT $4 OFFSET $5
            "#
        ))
        .bind(contains_pattern(&filter.name))
        .bind(contains_pattern(&filter.email))
        .bind(filter.role)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn count(&self, filter: &UserFilter) -> Result<i64, StoreError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
              FROM users
             WHERE ($1::text IS NULL OR name ILIKE $1)
               AND ($2::text IS NULL OR email ILIKE $2)
               AND ($3::user_role IS NULL OR role = $3)
            "#,
        )
        .bind(contains_pattern(&filter.name))
        .bind(contains_pattern(&filter.email))
        .bind(filter.role)
        .fetch_one(&self.db)
        .await?;
        Ok(total)
    }

    async fn registered_since(&self, since: OffsetDateTime) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM users WHERE registration_date >= $1 ORDER BY registration_date",
        )
        .bind(since)
        .fetch_all(&self.db)
        .await?;
        Ok(ids)
    }
}
