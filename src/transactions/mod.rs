use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod services;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::read_routes())
        .merge(handlers::write_routes())
}
