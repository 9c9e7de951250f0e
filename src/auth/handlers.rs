use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        jwt::{AuthUser, JwtKeys},
        password,
    },
    error::ApiError,
    state::AppState,
    store::LedgerStore,
};

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(ApiError::Validation("Name must not be empty".into()));
    }

    if state
        .store
        .find_user_by_email(&payload.email)
        .await?
        .is_some()
    {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let hash = password::hash_password(&payload.password).map_err(|e| {
        error!(error = %e, "hash_password failed");
        ApiError::Internal(e.to_string())
    })?;

    let user = state
        .store
        .create_user(
            &payload.email,
            &hash,
            payload.first_name.trim(),
            payload.last_name.trim(),
        )
        .await?;

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(user.id, &user.email).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        ApiError::Internal(e.to_string())
    })?;

    info!(user_id = %user.id, "user registered");
    Ok(Json(AuthResponse {
        access_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }

    let user = state
        .store
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            ApiError::Unauthorized("Invalid credentials".into())
        })?;

    let ok = password::verify_password(&payload.password, &user.password_hash).map_err(|e| {
        error!(error = %e, "verify_password failed");
        ApiError::Internal(e.to_string())
    })?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys.sign(user.id, &user.email).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        ApiError::Internal(e.to_string())
    })?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        user: user.into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("spaces in@mail.com"));
    }

    #[test]
    fn public_user_never_serializes_hash() {
        let response = PublicUser {
            id: uuid::Uuid::new_v4(),
            email: "test@example.com".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("password"));
    }
}
