use axum::Router;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::AuthUser;
pub use error::AppError;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::profiles())
        .merge(routes::catalog())
        .merge(routes::jobs())
        .merge(routes::applications())
        .merge(routes::notifications())
        .merge(routes::reviews())
        .merge(routes::uploads())
        .with_state(state)
}
