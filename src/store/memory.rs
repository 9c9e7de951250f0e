use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ApiError;
use crate::period::MonthKey;

use super::{
    Budget, BudgetPatch, Category, LedgerStore, NewBudget, NewTransaction, Transaction,
    TransactionFilter, TransactionPatch, User,
};

/// In-memory ledger store. Backs the test suite so the services can be
/// exercised without a database; every operation holds the single state lock
/// for its whole duration, which gives the same atomicity the Postgres store
/// gets from its transactions.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    transactions: Vec<Transaction>,
    budgets: Vec<Budget>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(tx: &Transaction, filter: &TransactionFilter) -> bool {
    if let Some(month) = &filter.month {
        if !month.contains(tx.date) {
            return false;
        }
    }
    if let Some(category) = filter.category {
        if tx.category != category {
            return false;
        }
    }
    if let Some(kind) = filter.kind {
        if tx.kind != kind {
            return false;
        }
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let description_hit = tx
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&needle));
        let category_hit = tx.category.as_str().to_lowercase().contains(&needle);
        let amount_hit = tx.amount.to_string().contains(&needle);
        if !(description_hit || category_hit || amount_hit) {
            return false;
        }
    }
    true
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let state = self.state.lock().await;
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, ApiError> {
        let mut state = self.state.lock().await;
        if state.users.iter().any(|u| u.email == email) {
            return Err(ApiError::Conflict("Record already exists".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_owned(),
            password_hash: password_hash.to_owned(),
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            created_at: OffsetDateTime::now_utc(),
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn find_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, ApiError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Transaction> = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && matches(t, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(rows)
    }

    async fn insert_transaction(&self, new: NewTransaction) -> Result<Transaction, ApiError> {
        let mut state = self.state.lock().await;
        let tx = Transaction {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            amount: new.amount,
            kind: new.kind,
            category: new.category,
            date: new.date,
            description: new.description,
            created_at: OffsetDateTime::now_utc(),
        };
        state.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn update_transaction(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, ApiError> {
        let mut state = self.state.lock().await;
        let Some(tx) = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
        else {
            return Ok(None);
        };
        if let Some(amount) = patch.amount {
            tx.amount = amount;
        }
        if let Some(kind) = patch.kind {
            tx.kind = kind;
        }
        if let Some(category) = patch.category {
            tx.category = category;
        }
        if let Some(date) = patch.date {
            tx.date = date;
        }
        if let Some(description) = patch.description {
            tx.description = Some(description);
        }
        Ok(Some(tx.clone()))
    }

    async fn delete_transaction(&self, id: Uuid, user_id: Uuid) -> Result<bool, ApiError> {
        let mut state = self.state.lock().await;
        let before = state.transactions.len();
        state
            .transactions
            .retain(|t| !(t.id == id && t.user_id == user_id));
        Ok(state.transactions.len() < before)
    }

    async fn find_budgets(&self, user_id: Uuid) -> Result<Vec<Budget>, ApiError> {
        let state = self.state.lock().await;
        let mut rows: Vec<Budget> = state
            .budgets
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.month.cmp(&a.month));
        Ok(rows)
    }

    async fn find_budgets_for_month(
        &self,
        user_id: Uuid,
        month: &MonthKey,
    ) -> Result<Vec<Budget>, ApiError> {
        let state = self.state.lock().await;
        Ok(state
            .budgets
            .iter()
            .filter(|b| b.user_id == user_id && month.contains(b.month))
            .cloned()
            .collect())
    }

    async fn find_budget_for_slot(
        &self,
        user_id: Uuid,
        category: Category,
        month: &MonthKey,
    ) -> Result<Option<Budget>, ApiError> {
        let state = self.state.lock().await;
        Ok(state
            .budgets
            .iter()
            .find(|b| b.user_id == user_id && b.category == category && month.contains(b.month))
            .cloned())
    }

    async fn insert_budget(&self, new: NewBudget) -> Result<Option<Budget>, ApiError> {
        // Existence check and insert under one lock acquisition.
        let mut state = self.state.lock().await;
        let month = MonthKey::of(new.month);
        let taken = state
            .budgets
            .iter()
            .any(|b| b.user_id == new.user_id && b.category == new.category && month.contains(b.month));
        if taken {
            return Ok(None);
        }
        let budget = Budget {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            amount: new.amount,
            category: new.category,
            month: new.month,
            created_at: OffsetDateTime::now_utc(),
        };
        state.budgets.push(budget.clone());
        Ok(Some(budget))
    }

    async fn update_budget(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: BudgetPatch,
    ) -> Result<Option<Budget>, ApiError> {
        let mut state = self.state.lock().await;
        let Some(budget) = state
            .budgets
            .iter_mut()
            .find(|b| b.id == id && b.user_id == user_id)
        else {
            return Ok(None);
        };
        if let Some(amount) = patch.amount {
            budget.amount = amount;
        }
        if let Some(category) = patch.category {
            budget.category = category;
        }
        if let Some(month) = patch.month {
            budget.month = month;
        }
        Ok(Some(budget.clone()))
    }

    async fn delete_budget(&self, id: Uuid, user_id: Uuid) -> Result<bool, ApiError> {
        let mut state = self.state.lock().await;
        let before = state.budgets.len();
        state
            .budgets
            .retain(|b| !(b.id == id && b.user_id == user_id));
        Ok(state.budgets.len() < before)
    }
}
