use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::ApiError,
    period::MonthKey,
    state::AppState,
    store::Transaction,
};

use super::dto::{
    CreateTransactionRequest, FilterParams, MonthlyReport, UpdateTransactionRequest,
};
use super::services;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions))
        .route("/transactions/filter", get(filter_transactions))
        .route("/transactions/report/:month", get(monthly_report))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/transactions", post(create_transaction))
        .route(
            "/transactions/:id",
            put(update_transaction).delete(delete_transaction),
        )
}

#[instrument(skip(state, payload))]
pub async fn create_transaction(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let stored = services::create_transaction(&state, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[instrument(skip(state))]
pub async fn list_transactions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let rows = services::list_transactions(&state, user_id).await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn filter_transactions(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<FilterParams>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let rows = services::filter_transactions(&state, user_id, params).await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn monthly_report(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(month): Path<String>,
) -> Result<Json<MonthlyReport>, ApiError> {
    let month = MonthKey::parse(&month)?;
    let report = services::monthly_report(&state, user_id, &month).await?;
    Ok(Json(report))
}

#[instrument(skip(state, payload))]
pub async fn update_transaction(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTransactionRequest>,
) -> Result<Json<Transaction>, ApiError> {
    let updated = services::update_transaction(&state, user_id, id, payload).await?;
    Ok(Json(updated))
}

#[instrument(skip(state))]
pub async fn delete_transaction(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    services::delete_transaction(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
