use axum::Router;

use crate::AppState;

mod error;
mod guard;
mod handlers;
mod routes;

pub use error::AppError;
pub use guard::CurrentUser;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::notifications())
        .merge(routes::theme())
        .merge(routes::pages(state.clone()))
        .with_state(state)
}
