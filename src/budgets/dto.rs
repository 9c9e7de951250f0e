use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::period;
use crate::store::{Budget, Category};

#[derive(Debug, Deserialize)]
pub struct CreateBudgetRequest {
    pub amount: Decimal,
    pub category: Category,
    /// `YYYY-MM` or a full date; the day is ignored.
    pub month: String,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateBudgetRequest {
    pub amount: Option<Decimal>,
    pub category: Option<Category>,
    pub month: Option<String>,
}

/// Stored budget with the month rendered back as `YYYY-MM-DD`.
#[derive(Debug, Serialize)]
pub struct BudgetResponse {
    pub id: Uuid,
    pub amount: Decimal,
    pub category: Category,
    pub month: String,
    pub created_at: OffsetDateTime,
}

impl From<Budget> for BudgetResponse {
    fn from(budget: Budget) -> Self {
        Self {
            id: budget.id,
            amount: budget.amount,
            category: budget.category,
            month: period::render_date(budget.month),
            created_at: budget.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Ok,
    Warning,
    Exceeded,
}

/// Structured classification of one budget against actual spend.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStanding {
    pub category: Category,
    pub budgeted: Decimal,
    pub spent: Decimal,
    pub status: BudgetStatus,
}

/// Alert report for a month: the human-readable strings the original
/// clients consume, plus the structured standings they are derived from.
#[derive(Debug, Serialize)]
pub struct BudgetAlerts {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub statuses: Vec<BudgetStanding>,
}
