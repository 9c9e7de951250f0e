use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ApiError;
use crate::period::MonthKey;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Transaction polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "transaction_kind", rename_all = "lowercase")]
pub enum TxKind {
    Income,
    Expense,
}

/// Closed category set shared by transactions and budgets. A budget may use
/// any value, including `Salary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_category")]
pub enum Category {
    Food,
    Bills,
    Shopping,
    Salary,
    Petrol,
    Entertainment,
    Healthcare,
    Travel,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Bills => "Bills",
            Category::Shopping => "Shopping",
            Category::Salary => "Salary",
            Category::Petrol => "Petrol",
            Category::Entertainment => "Entertainment",
            Category::Healthcare => "Healthcare",
            Category::Travel => "Travel",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub kind: TxKind,
    pub category: Category,
    pub date: Date,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Budget {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub category: Category,
    /// Day component is always normalized to the first of the month.
    pub month: Date,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub kind: TxKind,
    pub category: Category,
    pub date: Date,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewBudget {
    pub user_id: Uuid,
    pub amount: Decimal,
    pub category: Category,
    pub month: Date,
}

/// Partial-field merge for transaction updates; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub amount: Option<Decimal>,
    pub kind: Option<TxKind>,
    pub category: Option<Category>,
    pub date: Option<Date>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BudgetPatch {
    pub amount: Option<Decimal>,
    pub category: Option<Category>,
    pub month: Option<Date>,
}

/// Predicate for transaction queries. All fields are conjunctive; `search`
/// is a case-insensitive substring match across description, category and
/// amount.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub month: Option<MonthKey>,
    pub category: Option<Category>,
    pub kind: Option<TxKind>,
    pub search: Option<String>,
}

impl TransactionFilter {
    pub fn month(month: MonthKey) -> Self {
        Self {
            month: Some(month),
            ..Self::default()
        }
    }
}

/// Durable keyed storage for users, transactions and budgets.
///
/// Production runs on Postgres (`PgStore`); tests drive the same services
/// over `MemoryStore`. Reads and mutations of owned records are keyed by
/// `(id, user_id)`, so a record owned by someone else behaves as absent.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError>;
    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, ApiError>;

    /// Matching transactions, most recent date first.
    async fn find_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, ApiError>;
    async fn insert_transaction(&self, new: NewTransaction) -> Result<Transaction, ApiError>;
    /// `None` when the transaction does not exist or is owned by another user.
    async fn update_transaction(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, ApiError>;
    /// `false` when nothing was removed.
    async fn delete_transaction(&self, id: Uuid, user_id: Uuid) -> Result<bool, ApiError>;

    /// All budgets of a user, most recent month first.
    async fn find_budgets(&self, user_id: Uuid) -> Result<Vec<Budget>, ApiError>;
    async fn find_budgets_for_month(
        &self,
        user_id: Uuid,
        month: &MonthKey,
    ) -> Result<Vec<Budget>, ApiError>;
    async fn find_budget_for_slot(
        &self,
        user_id: Uuid,
        category: Category,
        month: &MonthKey,
    ) -> Result<Option<Budget>, ApiError>;
    /// Atomic insert-if-absent on the (user, category, month) slot; `None`
    /// means the slot was already taken, including by a concurrent insert.
    async fn insert_budget(&self, new: NewBudget) -> Result<Option<Budget>, ApiError>;
    async fn update_budget(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: BudgetPatch,
    ) -> Result<Option<Budget>, ApiError>;
    async fn delete_budget(&self, id: Uuid, user_id: Uuid) -> Result<bool, ApiError>;
}
