//! In-memory stores for tests that exercise services and routes without
//! Postgres, plus helpers for the tests that do run against it.

use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use time::{Duration, OffsetDateTime};

use crate::{
    auth::{
        repo::UserStore,
        repo_types::{User, UserProfile},
    },
    db::StoreError,
    expenses::{repo::ExpenseStore, repo_types::Expense},
};

/// Migrated pool on `DATABASE_URL`, or `None` when the variable is unset so
/// the Postgres-backed tests skip on machines without a database.
pub async fn pg_pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("connect to DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("apply migrations");
    Some(pool)
}

/// Email no other test run will have registered.
pub fn unique_email(tag: &str) -> String {
    format!("{tag}-{:016x}@example.com", rand::random::<u64>())
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, email: &str, password_hash: &str) -> Result<UserProfile, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: users.len() as i64 + 1,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user.into())
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let users = self.users.lock().unwrap();
        users
            .iter()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: i64) -> Result<UserProfile, StoreError> {
        let users = self.users.lock().unwrap();
        users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .map(UserProfile::from)
            .ok_or(StoreError::NotFound)
    }
}

#[derive(Default)]
pub struct MemoryExpenseStore {
    inner: Mutex<ExpenseRows>,
}

#[derive(Default)]
struct ExpenseRows {
    next_id: i64,
    rows: Vec<Expense>,
}

#[async_trait]
impl ExpenseStore for MemoryExpenseStore {
    async fn create(&self, owner_id: i64, amount: f64, category: &str) -> Result<Expense, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        // strictly increasing timestamps keep the newest-first order observable
        let created_at = OffsetDateTime::now_utc() + Duration::milliseconds(inner.next_id);
        let expense = Expense {
            id: inner.next_id,
            user_id: owner_id,
            amount,
            category: category.to_string(),
            created_at,
        };
        inner.rows.push(expense.clone());
        Ok(expense)
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Expense>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut out: Vec<Expense> = inner
            .rows
            .iter()
            .filter(|e| e.user_id == owner_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn get_by_owner(&self, id: i64, owner_id: i64) -> Result<Expense, StoreError> {
        let inner = self.inner.lock().unwrap();
        inner
            .rows
            .iter()
            .find(|e| e.id == id && e.user_id == owner_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(
        &self,
        id: i64,
        owner_id: i64,
        amount: f64,
        category: &str,
    ) -> Result<Expense, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let row = inner
            .rows
            .iter_mut()
            .find(|e| e.id == id && e.user_id == owner_id)
            .ok_or(StoreError::NotFound)?;
        row.amount = amount;
        row.category = category.to_string();
        Ok(row.clone())
    }

    async fn delete_by_owner(&self, id: i64, owner_id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.rows.len();
        inner.rows.retain(|e| !(e.id == id && e.user_id == owner_id));
        if inner.rows.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

/// Store whose every call fails like a lost database connection.
pub struct BrokenExpenseStore;

#[async_trait]
impl ExpenseStore for BrokenExpenseStore {
    async fn create(&self, _: i64, _: f64, _: &str) -> Result<Expense, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn list_by_owner(&self, _: i64) -> Result<Vec<Expense>, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn get_by_owner(&self, _: i64, _: i64) -> Result<Expense, StoreError> {
        Err(StoreError::Timeout("expenses.get_by_owner"))
    }
    async fn update(&self, _: i64, _: i64, _: f64, _: &str) -> Result<Expense, StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
    async fn delete_by_owner(&self, _: i64, _: i64) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}
