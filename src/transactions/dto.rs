use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::store::{Category, TxKind};

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub category: Category,
    /// `YYYY-MM-DD`.
    pub date: String,
    pub description: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTransactionRequest {
    pub amount: Option<Decimal>,
    #[serde(rename = "type")]
    pub kind: Option<TxKind>,
    pub category: Option<Category>,
    pub date: Option<String>,
    pub description: Option<String>,
}

/// Query parameters of the transaction filter endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    pub month: Option<String>,
    pub category: Option<Category>,
    #[serde(rename = "type")]
    pub kind: Option<TxKind>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryExpense {
    pub category: Category,
    pub amount: Decimal,
}

/// Aggregated view of one calendar month. `category_expenses` carries the
/// expense side only; its order is unspecified.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReport {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub balance: Decimal,
    pub category_expenses: Vec<CategoryExpense>,
}
