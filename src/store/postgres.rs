use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::period::MonthKey;

use super::{
    Budget, BudgetPatch, Category, LedgerStore, NewBudget, NewTransaction, Transaction,
    TransactionFilter, TransactionPatch, User,
};

/// Postgres-backed ledger store. Month scoping is expressed as
/// `to_char(.., 'YYYY-MM') = $key`, the SQL rendering of the one
/// string-prefix rule in `period::MonthKey`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

pub async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .connect(&config.database_url)
        .await
        .context("connect to database")
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User, ApiError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, first_name, last_name, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, ApiError> {
        let search = filter.search.as_ref().map(|s| format!("%{s}%"));
        let rows = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, user_id, amount, kind, category, date, description, created_at
            FROM transactions
            WHERE user_id = $1
              AND ($2::text IS NULL OR to_char(date, 'YYYY-MM') = $2)
              AND ($3::transaction_category IS NULL OR category = $3)
              AND ($4::transaction_kind IS NULL OR kind = $4)
              AND ($5::text IS NULL
                   OR description ILIKE $5
                   OR category::text ILIKE $5
                   OR amount::text ILIKE $5)
            ORDER BY date DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(filter.month.as_ref().map(MonthKey::as_str))
        .bind(filter.category)
        .bind(filter.kind)
        .bind(search)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_transaction(&self, new: NewTransaction) -> Result<Transaction, ApiError> {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (user_id, amount, kind, category, date, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, amount, kind, category, date, description, created_at
            "#,
        )
        .bind(new.user_id)
        .bind(new.amount)
        .bind(new.kind)
        .bind(new.category)
        .bind(new.date)
        .bind(new.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_transaction(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: TransactionPatch,
    ) -> Result<Option<Transaction>, ApiError> {
        let row = sqlx::query_as::<_, Transaction>(
            r#"
            UPDATE transactions
            SET amount      = COALESCE($3, amount),
                kind        = COALESCE($4, kind),
                category    = COALESCE($5, category),
                date        = COALESCE($6, date),
                description = COALESCE($7, description)
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, amount, kind, category, date, description, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(patch.amount)
        .bind(patch.kind)
        .bind(patch.category)
        .bind(patch.date)
        .bind(patch.description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_transaction(&self, id: Uuid, user_id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query(
            r#"
            DELETE FROM transactions
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_budgets(&self, user_id: Uuid) -> Result<Vec<Budget>, ApiError> {
        let rows = sqlx::query_as::<_, Budget>(
            r#"
            SELECT id, user_id, amount, category, month, created_at
            FROM budgets
            WHERE user_id = $1
            ORDER BY month DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_budgets_for_month(
        &self,
        user_id: Uuid,
        month: &MonthKey,
    ) -> Result<Vec<Budget>, ApiError> {
        let rows = sqlx::query_as::<_, Budget>(
            r#"
            SELECT id, user_id, amount, category, month, created_at
            FROM budgets
            WHERE user_id = $1 AND to_char(month, 'YYYY-MM') = $2
            "#,
        )
        .bind(user_id)
        .bind(month.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_budget_for_slot(
        &self,
        user_id: Uuid,
        category: Category,
        month: &MonthKey,
    ) -> Result<Option<Budget>, ApiError> {
        let row = sqlx::query_as::<_, Budget>(
            r#"
            SELECT id, user_id, amount, category, month, created_at
            FROM budgets
            WHERE user_id = $1 AND category = $2 AND to_char(month, 'YYYY-MM') = $3
            "#,
        )
        .bind(user_id)
        .bind(category)
        .bind(month.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_budget(&self, new: NewBudget) -> Result<Option<Budget>, ApiError> {
        // Check-then-insert under a transaction-scoped advisory lock keyed by
        // the slot, so two concurrent creates for the same slot cannot both
        // pass the existence check. A unique index would also catch the race
        // but would reject updates that move a budget onto an occupied slot,
        // which the update path permits.
        let month = MonthKey::of(new.month);
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1)::bigint)")
            .bind(format!("budget:{}:{}:{}", new.user_id, new.category, month))
            .execute(&mut *tx)
            .await?;
        let taken = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM budgets
                WHERE user_id = $1 AND category = $2 AND to_char(month, 'YYYY-MM') = $3
            )
            "#,
        )
        .bind(new.user_id)
        .bind(new.category)
        .bind(month.as_str())
        .fetch_one(&mut *tx)
        .await?;
        if taken {
            tx.rollback().await?;
            return Ok(None);
        }
        let row = sqlx::query_as::<_, Budget>(
            r#"
            INSERT INTO budgets (user_id, amount, category, month)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, amount, category, month, created_at
            "#,
        )
        .bind(new.user_id)
        .bind(new.amount)
        .bind(new.category)
        .bind(new.month)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Some(row))
    }

    async fn update_budget(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: BudgetPatch,
    ) -> Result<Option<Budget>, ApiError> {
        let row = sqlx::query_as::<_, Budget>(
            r#"
            UPDATE budgets
            SET amount   = COALESCE($3, amount),
                category = COALESCE($4, category),
                month    = COALESCE($5, month)
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, amount, category, month, created_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(patch.amount)
        .bind(patch.category)
        .bind(patch.month)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_budget(&self, id: Uuid, user_id: Uuid) -> Result<bool, ApiError> {
        let result = sqlx::query(
            r#"
            DELETE FROM budgets
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
