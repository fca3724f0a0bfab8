use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Expense record in the database.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64, // owner
    pub amount: f64,
    pub category: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
