use crate::db::AppState;
use axum::Router;

pub mod cookies;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod tokens;
pub mod validate;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
