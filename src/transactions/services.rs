use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::period::{self, MonthKey};
use crate::state::AppState;
use crate::store::{
    Category, LedgerStore, NewTransaction, Transaction, TransactionFilter, TransactionPatch, TxKind,
};

use super::dto::{
    CategoryExpense, CreateTransactionRequest, FilterParams, MonthlyReport,
    UpdateTransactionRequest,
};

/// Creates a transaction. Income is admitted after field validation only;
/// expenses additionally pass admission control: the month's balance and the
/// category's budget ceiling, both evaluated before the write, serialized
/// per (user, month) so concurrent admissions cannot overshoot together.
pub async fn create_transaction(
    state: &AppState,
    user_id: Uuid,
    req: CreateTransactionRequest,
) -> Result<Transaction, ApiError> {
    let amount = require_positive(req.amount)?;
    let date = period::parse_date(&req.date)?;

    state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let new = NewTransaction {
        user_id,
        amount,
        kind: req.kind,
        category: req.category,
        date,
        description: req.description,
    };

    let stored = match new.kind {
        TxKind::Income => state.store.insert_transaction(new).await?,
        TxKind::Expense => admit_expense(state, new).await?,
    };
    info!(user_id = %user_id, transaction_id = %stored.id, kind = ?stored.kind, "transaction created");
    Ok(stored)
}

/// Admission sequence for an expense, short-circuiting on first failure:
/// balance check against the month's report, then the category budget
/// ceiling against already-recorded spend plus this expense. Both are
/// independent necessary conditions. Runs under the (user, month) scope
/// lock so the checks and the insert act as one unit against other writers
/// in the same scope.
async fn admit_expense(state: &AppState, new: NewTransaction) -> Result<Transaction, ApiError> {
    let month = MonthKey::of(new.date);
    let _guard = state.admission.acquire(new.user_id, month.clone()).await;

    let report = monthly_report(state, new.user_id, &month).await?;
    if new.amount > report.balance {
        return Err(ApiError::BusinessRule(
            "Expense exceeds available income".into(),
        ));
    }

    let already_spent = category_spend(state, new.user_id, &month, new.category).await?;
    let potential = already_spent + new.amount;
    if let Some(budget) = state
        .store
        .find_budget_for_slot(new.user_id, new.category, &month)
        .await?
    {
        if potential > budget.amount {
            return Err(ApiError::BusinessRule(format!(
                "Expense exceeds monthly budget for {}",
                new.category
            )));
        }
    }

    state.store.insert_transaction(new).await
}

/// Aggregates one calendar month for a user. Reads whatever transactions
/// exist; a month with none yields the all-zero report rather than an error.
pub async fn monthly_report(
    state: &AppState,
    user_id: Uuid,
    month: &MonthKey,
) -> Result<MonthlyReport, ApiError> {
    let transactions = state
        .store
        .find_transactions(user_id, &TransactionFilter::month(month.clone()))
        .await?;
    Ok(build_report(&transactions))
}

/// Single pass over a month's transactions: income and expense totals plus
/// per-category expense subtotals.
pub(crate) fn build_report(transactions: &[Transaction]) -> MonthlyReport {
    let mut total_income = Decimal::ZERO;
    let mut total_expenses = Decimal::ZERO;
    let mut by_category: HashMap<Category, Decimal> = HashMap::new();

    for tx in transactions {
        match tx.kind {
            TxKind::Income => total_income += tx.amount,
            TxKind::Expense => {
                total_expenses += tx.amount;
                *by_category.entry(tx.category).or_insert(Decimal::ZERO) += tx.amount;
            }
        }
    }

    MonthlyReport {
        balance: total_income - total_expenses,
        total_income,
        total_expenses,
        category_expenses: by_category
            .into_iter()
            .map(|(category, amount)| CategoryExpense { category, amount })
            .collect(),
    }
}

/// Expense total for one (user, month, category) scope.
async fn category_spend(
    state: &AppState,
    user_id: Uuid,
    month: &MonthKey,
    category: Category,
) -> Result<Decimal, ApiError> {
    let filter = TransactionFilter {
        month: Some(month.clone()),
        category: Some(category),
        kind: Some(TxKind::Expense),
        search: None,
    };
    let rows = state.store.find_transactions(user_id, &filter).await?;
    Ok(rows.iter().map(|t| t.amount).sum())
}

pub async fn list_transactions(
    state: &AppState,
    user_id: Uuid,
) -> Result<Vec<Transaction>, ApiError> {
    state
        .store
        .find_transactions(user_id, &TransactionFilter::default())
        .await
}

pub async fn filter_transactions(
    state: &AppState,
    user_id: Uuid,
    params: FilterParams,
) -> Result<Vec<Transaction>, ApiError> {
    let month = params.month.as_deref().map(MonthKey::parse).transpose()?;
    let filter = TransactionFilter {
        month,
        category: params.category,
        kind: params.kind,
        search: params.search.filter(|s| !s.is_empty()),
    };
    state.store.find_transactions(user_id, &filter).await
}

/// Partial-field merge. Field validation applies to whatever is supplied;
/// the merged record is not re-admitted against balance or budgets.
pub async fn update_transaction(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
    req: UpdateTransactionRequest,
) -> Result<Transaction, ApiError> {
    let amount = req.amount.map(require_positive).transpose()?;
    let date = req.date.as_deref().map(period::parse_date).transpose()?;
    let patch = TransactionPatch {
        amount,
        kind: req.kind,
        category: req.category,
        date,
        description: req.description,
    };
    state
        .store
        .update_transaction(id, user_id, patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("Transaction not found".into()))
}

pub async fn delete_transaction(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<(), ApiError> {
    let removed = state.store.delete_transaction(id, user_id).await?;
    if !removed {
        return Err(ApiError::NotFound("Transaction not found".into()));
    }
    info!(user_id = %user_id, transaction_id = %id, "transaction deleted");
    Ok(())
}

pub(crate) fn require_positive(amount: Decimal) -> Result<Decimal, ApiError> {
    if amount <= Decimal::ZERO {
        return Err(ApiError::Validation(
            "Amount must be greater than zero".into(),
        ));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;
    use time::OffsetDateTime;

    fn tx(kind: TxKind, category: Category, amount: Decimal) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount,
            kind,
            category,
            date: date!(2025 - 06 - 15),
            description: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn empty_month_is_the_zero_report() {
        let report = build_report(&[]);
        assert_eq!(report.total_income, Decimal::ZERO);
        assert_eq!(report.total_expenses, Decimal::ZERO);
        assert_eq!(report.balance, Decimal::ZERO);
        assert!(report.category_expenses.is_empty());
    }

    #[test]
    fn report_splits_kinds_and_groups_categories() {
        let report = build_report(&[
            tx(TxKind::Income, Category::Salary, dec!(1000.00)),
            tx(TxKind::Expense, Category::Food, dec!(120.50)),
            tx(TxKind::Expense, Category::Food, dec!(30.00)),
            tx(TxKind::Expense, Category::Bills, dec!(200.00)),
        ]);
        assert_eq!(report.total_income, dec!(1000.00));
        assert_eq!(report.total_expenses, dec!(350.50));
        assert_eq!(report.balance, dec!(649.50));

        // Output order is unspecified; compare as a set.
        let mut categories: Vec<CategoryExpense> = report.category_expenses;
        categories.sort_by_key(|c| c.category.as_str());
        assert_eq!(
            categories,
            vec![
                CategoryExpense {
                    category: Category::Bills,
                    amount: dec!(200.00)
                },
                CategoryExpense {
                    category: Category::Food,
                    amount: dec!(150.50)
                },
            ]
        );
    }

    #[test]
    fn balance_may_go_negative() {
        let report = build_report(&[
            tx(TxKind::Income, Category::Salary, dec!(100)),
            tx(TxKind::Expense, Category::Travel, dec!(250)),
        ]);
        assert_eq!(report.balance, dec!(-150));
        assert_eq!(
            report.balance,
            report.total_income - report.total_expenses
        );
    }

    #[test]
    fn income_only_categories_never_appear_in_expenses() {
        let report = build_report(&[tx(TxKind::Income, Category::Salary, dec!(500))]);
        assert!(report.category_expenses.is_empty());
    }

    #[test]
    fn positive_amount_gate() {
        assert!(require_positive(dec!(0.01)).is_ok());
        assert!(require_positive(Decimal::ZERO).is_err());
        assert!(require_positive(dec!(-5)).is_err());
    }
}
