use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::{auth::AuthUser, error::ApiError, period::MonthKey, state::AppState};

use super::dto::{BudgetAlerts, BudgetResponse, CreateBudgetRequest, UpdateBudgetRequest};
use super::services;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/budgets", get(list_budgets))
        .route("/budgets/alerts/:month", get(check_alerts))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/budgets", post(create_budget))
        .route("/budgets/:id", put(update_budget).delete(delete_budget))
}

#[instrument(skip(state, payload))]
pub async fn create_budget(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateBudgetRequest>,
) -> Result<(StatusCode, Json<BudgetResponse>), ApiError> {
    let stored = services::create_budget(&state, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[instrument(skip(state))]
pub async fn list_budgets(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<BudgetResponse>>, ApiError> {
    let budgets = services::list_budgets(&state, user_id).await?;
    Ok(Json(budgets))
}

#[instrument(skip(state))]
pub async fn check_alerts(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(month): Path<String>,
) -> Result<Json<BudgetAlerts>, ApiError> {
    let month = MonthKey::parse(&month)?;
    let alerts = services::check_alerts(&state, user_id, &month).await?;
    Ok(Json(alerts))
}

#[instrument(skip(state, payload))]
pub async fn update_budget(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBudgetRequest>,
) -> Result<Json<BudgetResponse>, ApiError> {
    let updated = services::update_budget(&state, user_id, id, payload).await?;
    Ok(Json(updated))
}

#[instrument(skip(state))]
pub async fn delete_budget(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    services::delete_budget(&state, user_id, id).await?;
    Ok(Json(json!({ "message": "Budget deleted successfully" })))
}
