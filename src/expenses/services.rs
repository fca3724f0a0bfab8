use std::sync::Arc;

use axum::extract::FromRef;
use tracing::{debug, warn};

use super::{repo::ExpenseStore, repo_types::Expense};
use crate::{db::StoreError, state::AppState};

#[derive(Debug, thiserror::Error)]
pub enum ExpenseError {
    #[error("invalid id")]
    InvalidId,

    #[error("amount must be greater than 0")]
    InvalidAmount,

    #[error("category is required")]
    InvalidCategory,

    /// Absent, or owned by another user. The two are never told apart.
    #[error("expense not found")]
    NotFound,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ExpenseError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound,
            other => Self::Store(other),
        }
    }
}

/// Partial update: absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpensePatch {
    pub amount: Option<f64>,
    pub category: Option<String>,
}

/// Validates and applies expense commands on behalf of an authenticated owner.
#[derive(Clone)]
pub struct ExpenseService {
    store: Arc<dyn ExpenseStore>,
}

impl FromRef<AppState> for ExpenseService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.expenses.clone())
    }
}

impl ExpenseService {
    pub fn new(store: Arc<dyn ExpenseStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, owner_id: i64, amount: f64, category: &str) -> Result<Expense, ExpenseError> {
        validate_id(owner_id)?;
        let amount = validate_amount(amount)?;
        let category = validate_category(category)?;

        let expense = self.store.create(owner_id, amount, category).await?;
        debug!(owner_id, expense_id = expense.id, "expense persisted");
        Ok(expense)
    }

    pub async fn list(&self, owner_id: i64) -> Result<Vec<Expense>, ExpenseError> {
        validate_id(owner_id)?;
        Ok(self.store.list_by_owner(owner_id).await?)
    }

    pub async fn get(&self, expense_id: i64, owner_id: i64) -> Result<Expense, ExpenseError> {
        validate_id(expense_id)?;
        validate_id(owner_id)?;
        Ok(self.store.get_by_owner(expense_id, owner_id).await?)
    }

    /// Fetch, overlay the present patch fields, then write back both fields.
    ///
    /// The fetch and the write are separate statements, so two concurrent
    /// updates of the same expense resolve as last-writer-wins.
    pub async fn update(
        &self,
        expense_id: i64,
        owner_id: i64,
        patch: ExpensePatch,
    ) -> Result<Expense, ExpenseError> {
        validate_id(expense_id)?;
        validate_id(owner_id)?;

        let mut existing = self.store.get_by_owner(expense_id, owner_id).await?;

        if let Some(amount) = patch.amount {
            existing.amount = validate_amount(amount)?;
        }
        if let Some(category) = patch.category.as_deref() {
            existing.category = validate_category(category)?.to_string();
        }

        let updated = self
            .store
            .update(expense_id, owner_id, existing.amount, &existing.category)
            .await?;
        debug!(owner_id, expense_id, "expense updated");
        Ok(updated)
    }

    pub async fn delete(&self, expense_id: i64, owner_id: i64) -> Result<(), ExpenseError> {
        validate_id(expense_id)?;
        validate_id(owner_id)?;

        let existing = self.store.get_by_owner(expense_id, owner_id).await?;
        self.store
            .delete_by_owner(existing.id, existing.user_id)
            .await?;
        debug!(owner_id, expense_id, "expense deleted");
        Ok(())
    }
}

fn validate_id(id: i64) -> Result<(), ExpenseError> {
    if id <= 0 {
        warn!(id, "non-positive id");
        return Err(ExpenseError::InvalidId);
    }
    Ok(())
}

fn validate_amount(amount: f64) -> Result<f64, ExpenseError> {
    // NaN fails the comparison
    if !(amount.is_finite() && amount > 0.0) {
        return Err(ExpenseError::InvalidAmount);
    }
    Ok(amount)
}

fn validate_category(category: &str) -> Result<&str, ExpenseError> {
    let trimmed = category.trim();
    if trimmed.is_empty() {
        return Err(ExpenseError::InvalidCategory);
    }
    Ok(trimmed)
}
