use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    auth::repo_types::{User, UserProfile},
    db::{bounded, StoreError},
};

/// Persistence of user identities.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::DuplicateEmail`] when the email is taken.
    async fn create(&self, email: &str, password_hash: &str) -> Result<UserProfile, StoreError>;

    /// Full record, password hash included.
    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: i64) -> Result<UserProfile, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, email: &str, password_hash: &str) -> Result<UserProfile, StoreError> {
        let query = sqlx::query_as::<_, UserProfile>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.db);

        bounded(self.timeout, "users.create", query)
            .await
            .map_err(|e| match e {
                StoreError::Database(sqlx::Error::Database(ref db_err))
                    if db_err.is_unique_violation() =>
                {
                    StoreError::DuplicateEmail
                }
                other => other,
            })
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let query = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db);

        bounded(self.timeout, "users.find_by_email", query)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: i64) -> Result<UserProfile, StoreError> {
        let query = sqlx::query_as::<_, UserProfile>(
            r#"SELECT id, email, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db);

        bounded(self.timeout, "users.find_by_id", query)
            .await?
            .ok_or(StoreError::NotFound)
    }
}
