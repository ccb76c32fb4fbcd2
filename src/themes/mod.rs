pub mod dto;
pub mod handlers;
pub mod repo_types;
pub mod urls;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::theme_routes()
}
