use serde::{Deserialize, Serialize};

use super::{repo_types::Expense, services::ExpensePatch};

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub amount: f64,
    pub category: String,
}

/// Every field optional; `null` counts as absent.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateExpenseRequest {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

impl From<UpdateExpenseRequest> for ExpensePatch {
    fn from(r: UpdateExpenseRequest) -> Self {
        Self {
            amount: r.amount,
            category: r.category,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpenseEnvelope {
    pub expense: Expense,
}

#[derive(Debug, Serialize)]
pub struct ExpenseList {
    pub expenses: Vec<Expense>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
