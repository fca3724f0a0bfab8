use axum::{
    extract::{Path, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{CreateExpenseRequest, ExpenseEnvelope, ExpenseList, MessageResponse, UpdateExpenseRequest},
    repo_types::Expense,
    services::ExpenseService,
};
use crate::{auth::extractors::AuthUser, error::AppError, extract::ValidJson, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/expenses", get(list_expenses).post(create_expense))
        .route(
            "/expenses/:id",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
}

fn parse_expense_id(raw: &str) -> Result<i64, AppError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => {
            warn!(raw, "invalid expense id");
            Err(AppError::Validation("invalid expense id"))
        }
    }
}

#[instrument(skip(expenses, payload))]
pub async fn create_expense(
    State(expenses): State<ExpenseService>,
    AuthUser(user_id): AuthUser,
    ValidJson(payload): ValidJson<CreateExpenseRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Expense>), AppError> {
    let expense = expenses
        .create(user_id, payload.amount, &payload.category)
        .await?;
    info!(user_id, expense_id = expense.id, "expense created");

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/expenses/{}", expense.id)) {
        headers.insert(LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(expense)))
}

#[instrument(skip(expenses))]
pub async fn list_expenses(
    State(expenses): State<ExpenseService>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ExpenseList>, AppError> {
    let expenses = expenses.list(user_id).await?;
    Ok(Json(ExpenseList { expenses }))
}

#[instrument(skip(expenses))]
pub async fn get_expense(
    State(expenses): State<ExpenseService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<ExpenseEnvelope>, AppError> {
    let id = parse_expense_id(&id)?;
    let expense = expenses.get(id, user_id).await?;
    Ok(Json(ExpenseEnvelope { expense }))
}

#[instrument(skip(expenses, payload))]
pub async fn update_expense(
    State(expenses): State<ExpenseService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UpdateExpenseRequest>,
) -> Result<Json<ExpenseEnvelope>, AppError> {
    let id = parse_expense_id(&id)?;
    let expense = expenses.update(id, user_id, payload.into()).await?;
    info!(user_id, expense_id = id, "expense updated");
    Ok(Json(ExpenseEnvelope { expense }))
}

#[instrument(skip(expenses))]
pub async fn delete_expense(
    State(expenses): State<ExpenseService>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_expense_id(&id)?;
    expenses.delete(id, user_id).await?;
    info!(user_id, expense_id = id, "expense deleted");
    Ok(Json(MessageResponse {
        message: "expense deleted successfully",
    }))
}
