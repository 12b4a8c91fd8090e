use axum::{middleware, routing::get, routing::post, Router};

use crate::http::{guard, handlers};
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::current_user))
}

pub fn notifications() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route("/notifications/read-all", post(handlers::mark_all_read))
}

pub fn theme() -> Router<AppState> {
    Router::new()
        .route("/theme", get(handlers::get_theme))
        .route("/theme/toggle", post(handlers::toggle_theme))
}

/// Page surface, guarded by the navigation middleware.
pub fn pages(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root))
        .route("/login", get(handlers::login_page))
        .route("/dashboard", get(handlers::dashboard))
        .route("/equipo/:id", get(handlers::equipment_detail))
        .route("/reportes", get(handlers::reports))
        .route("/admin/usuarios", get(handlers::admin_users))
        .route("/admin/equipos", get(handlers::admin_equipment))
        .route("/admin/tareas", get(handlers::admin_tasks))
        .route_layer(middleware::from_fn_with_state(state, guard::page_guard))
}
