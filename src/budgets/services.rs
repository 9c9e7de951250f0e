use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::period::{self, MonthKey};
use crate::state::AppState;
use crate::store::{
    Budget, BudgetPatch, Category, LedgerStore, NewBudget, Transaction, TransactionFilter, TxKind,
};
use crate::transactions::services::require_positive;

use super::dto::{
    BudgetAlerts, BudgetResponse, BudgetStanding, BudgetStatus, CreateBudgetRequest,
    UpdateBudgetRequest,
};

/// Warning threshold as a fraction of the budgeted amount.
const WARNING_RATIO: Decimal = Decimal::from_parts(8, 0, 0, false, 1);

pub async fn create_budget(
    state: &AppState,
    user_id: Uuid,
    req: CreateBudgetRequest,
) -> Result<BudgetResponse, ApiError> {
    let amount = require_positive(req.amount)?;
    let month = period::parse_month_arg(&req.month)?;

    state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let new = NewBudget {
        user_id,
        amount,
        category: req.category,
        month,
    };
    let Some(stored) = state.store.insert_budget(new).await? else {
        return Err(ApiError::Conflict(format!(
            "Budget already exists for {} in {}. Use update instead.",
            req.category, req.month
        )));
    };

    info!(user_id = %user_id, budget_id = %stored.id, category = %stored.category, "budget created");
    Ok(stored.into())
}

pub async fn list_budgets(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<BudgetResponse>, ApiError> {
    let budgets = state.store.find_budgets(user_id).await?;
    Ok(budgets.into_iter().map(BudgetResponse::from).collect())
}

/// Classifies every budget of the month against actual spend. The expense
/// totals are re-derived here through the same month filter the report uses,
/// so the two views cannot disagree on which transactions belong to the
/// month.
pub async fn check_alerts(
    state: &AppState,
    user_id: Uuid,
    month: &MonthKey,
) -> Result<BudgetAlerts, ApiError> {
    let budgets = state.store.find_budgets_for_month(user_id, month).await?;
    let expenses = state
        .store
        .find_transactions(
            user_id,
            &TransactionFilter {
                month: Some(month.clone()),
                kind: Some(TxKind::Expense),
                ..TransactionFilter::default()
            },
        )
        .await?;

    let spent = spent_by_category(&expenses);
    let statuses = evaluate(&budgets, &spent);

    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    for standing in &statuses {
        match standing.status {
            BudgetStatus::Exceeded => errors.push(format!(
                "Budget exceeded for {}: Rs {:.2} spent of Rs {:.2} budget",
                standing.category, standing.spent, standing.budgeted
            )),
            BudgetStatus::Warning => warnings.push(format!(
                "Near budget limit for {}: Rs {:.2} spent of Rs {:.2} budget",
                standing.category, standing.spent, standing.budgeted
            )),
            BudgetStatus::Ok => {}
        }
    }

    Ok(BudgetAlerts {
        warnings,
        errors,
        statuses,
    })
}

pub(crate) fn spent_by_category(expenses: &[Transaction]) -> HashMap<Category, Decimal> {
    let mut spent: HashMap<Category, Decimal> = HashMap::new();
    for tx in expenses {
        *spent.entry(tx.category).or_insert(Decimal::ZERO) += tx.amount;
    }
    spent
}

/// One standing per budget. Spend at or above the budgeted amount is
/// EXCEEDED; at or above 80% of it, WARNING; the 100% check wins when both
/// hold. Categories without a budget are not classified at all.
pub(crate) fn evaluate(
    budgets: &[Budget],
    spent: &HashMap<Category, Decimal>,
) -> Vec<BudgetStanding> {
    budgets
        .iter()
        .map(|budget| {
            let spent_amount = spent.get(&budget.category).copied().unwrap_or(Decimal::ZERO);
            let status = if spent_amount >= budget.amount {
                BudgetStatus::Exceeded
            } else if spent_amount >= budget.amount * WARNING_RATIO {
                BudgetStatus::Warning
            } else {
                BudgetStatus::Ok
            };
            BudgetStanding {
                category: budget.category,
                budgeted: budget.amount,
                spent: spent_amount,
                status,
            }
        })
        .collect()
}

/// Partial-field merge of amount, category and month. The merged record is
/// not checked against the one-budget-per-slot rule: an update may move a
/// budget onto a slot that already has one, and creation is the only place
/// uniqueness is enforced.
pub async fn update_budget(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    req: UpdateBudgetRequest,
) -> Result<BudgetResponse, ApiError> {
    let amount = req.amount.map(require_positive).transpose()?;
    let month = req
        .month
        .as_deref()
        .map(period::parse_month_arg)
        .transpose()?;
    let patch = BudgetPatch {
        amount,
        category: req.category,
        month,
    };
    let updated = state
        .store
        .update_budget(id, user_id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("Budget not found".into()))?;
    Ok(updated.into())
}

pub async fn delete_budget(state: &AppState, user_id: Uuid, id: Uuid) -> Result<(), ApiError> {
    let removed = state.store.delete_budget(id, user_id).await?;
    if !removed {
        return Err(ApiError::NotFound("Budget not found".into()));
    }
    info!(user_id = %user_id, budget_id = %id, "budget deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;
    use time::OffsetDateTime;

    fn budget(category: Category, amount: Decimal) -> Budget {
        Budget {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount,
            category,
            month: date!(2025 - 06 - 01),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn spent(entries: &[(Category, Decimal)]) -> HashMap<Category, Decimal> {
        entries.iter().copied().collect()
    }

    #[test]
    fn warning_ratio_is_eighty_percent() {
        assert_eq!(WARNING_RATIO, dec!(0.8));
    }

    #[test]
    fn below_warning_threshold_is_ok() {
        let standings = evaluate(
            &[budget(Category::Food, dec!(200))],
            &spent(&[(Category::Food, dec!(159.99))]),
        );
        assert_eq!(standings[0].status, BudgetStatus::Ok);
    }

    #[test]
    fn at_eighty_percent_is_a_warning() {
        let standings = evaluate(
            &[budget(Category::Food, dec!(200))],
            &spent(&[(Category::Food, dec!(160.00))]),
        );
        assert_eq!(standings[0].status, BudgetStatus::Warning);
    }

    #[test]
    fn spend_equal_to_budget_is_exceeded_not_warning() {
        let standings = evaluate(
            &[budget(Category::Food, dec!(200))],
            &spent(&[(Category::Food, dec!(200.00))]),
        );
        assert_eq!(standings[0].status, BudgetStatus::Exceeded);
    }

    #[test]
    fn unbudgeted_spend_produces_no_standing() {
        let standings = evaluate(
            &[budget(Category::Food, dec!(200))],
            &spent(&[(Category::Travel, dec!(9999))]),
        );
        assert_eq!(standings.len(), 1);
        assert_eq!(standings[0].category, Category::Food);
        assert_eq!(standings[0].spent, Decimal::ZERO);
        assert_eq!(standings[0].status, BudgetStatus::Ok);
    }

    #[test]
    fn budget_with_no_spend_is_ok() {
        let standings = evaluate(&[budget(Category::Bills, dec!(50))], &HashMap::new());
        assert_eq!(standings[0].status, BudgetStatus::Ok);
        assert_eq!(standings[0].spent, Decimal::ZERO);
    }

    #[test]
    fn spent_by_category_accumulates_per_category() {
        fn tx(category: Category, amount: Decimal) -> Transaction {
            Transaction {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                amount,
                kind: TxKind::Expense,
                category,
                date: date!(2025 - 06 - 10),
                description: None,
                created_at: OffsetDateTime::now_utc(),
            }
        }
        let totals = spent_by_category(&[
            tx(Category::Food, dec!(10.25)),
            tx(Category::Food, dec!(4.75)),
            tx(Category::Petrol, dec!(60)),
        ]);
        assert_eq!(totals[&Category::Food], dec!(15.00));
        assert_eq!(totals[&Category::Petrol], dec!(60));
    }
}
