use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    db::{bounded, StoreError},
    expenses::repo_types::Expense,
};

/// Persistence of expenses. Every lookup and mutation is keyed by
/// `(id, owner_id)`; a row owned by someone else reports [`StoreError::NotFound`].
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn create(&self, owner_id: i64, amount: f64, category: &str) -> Result<Expense, StoreError>;

    /// Newest first.
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Expense>, StoreError>;

    async fn get_by_owner(&self, id: i64, owner_id: i64) -> Result<Expense, StoreError>;

    /// Replaces both mutable fields.
    async fn update(
        &self,
        id: i64,
        owner_id: i64,
        amount: f64,
        category: &str,
    ) -> Result<Expense, StoreError>;

    async fn delete_by_owner(&self, id: i64, owner_id: i64) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct PgExpenseStore {
    db: PgPool,
    timeout: Duration,
}

impl PgExpenseStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

#[async_trait]
impl ExpenseStore for PgExpenseStore {
    async fn create(&self, owner_id: i64, amount: f64, category: &str) -> Result<Expense, StoreError> {
        let query = sqlx::query_as::<_, Expense>(
            r#"
            INSERT INTO expenses (user_id, amount, category)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, amount, category, created_at
            "#,
        )
        .bind(owner_id)
        .bind(amount)
        .bind(category)
        .fetch_one(&self.db);

        bounded(self.timeout, "expenses.create", query).await
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Expense>, StoreError> {
        let query = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, user_id, amount, category, created_at
            FROM expenses
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.db);

        bounded(self.timeout, "expenses.list_by_owner", query).await
    }

    async fn get_by_owner(&self, id: i64, owner_id: i64) -> Result<Expense, StoreError> {
        let query = sqlx::query_as::<_, Expense>(
            r#"
            SELECT id, user_id, amount, category, created_at
            FROM expenses
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.db);

        bounded(self.timeout, "expenses.get_by_owner", query)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update(
        &self,
        id: i64,
        owner_id: i64,
        amount: f64,
        category: &str,
    ) -> Result<Expense, StoreError> {
        let query = sqlx::query_as::<_, Expense>(
            r#"
            UPDATE expenses
            SET amount = $1, category = $2
            WHERE id = $3 AND user_id = $4
            RETURNING id, user_id, amount, category, created_at
            "#,
        )
        .bind(amount)
        .bind(category)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.db);

        bounded(self.timeout, "expenses.update", query)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete_by_owner(&self, id: i64, owner_id: i64) -> Result<(), StoreError> {
        let query = sqlx::query(r#"DELETE FROM expenses WHERE id = $1 AND user_id = $2"#)
            .bind(id)
            .bind(owner_id)
            .execute(&self.db);

        let done = bounded(self.timeout, "expenses.delete_by_owner", query).await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
