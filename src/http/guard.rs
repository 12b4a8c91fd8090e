use axum::extract::{FromRequestParts, MatchedPath, Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::domain::profile::Profile;
use crate::http::AppError;
use crate::AppState;

pub const LOGIN_PATH: &str = "/login";
pub const LANDING_PATH: &str = "/dashboard";

/// Navigation metadata consulted before each page navigation.
#[derive(Debug, Clone, Copy)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub admin_only: bool,
}

const PUBLIC: RouteMeta = RouteMeta {
    requires_auth: false,
    admin_only: false,
};
const AUTHENTICATED: RouteMeta = RouteMeta {
    requires_auth: true,
    admin_only: false,
};
const ADMIN: RouteMeta = RouteMeta {
    requires_auth: true,
    admin_only: true,
};

/// Matched-path patterns of the page surface with their guard metadata.
pub const PAGE_ROUTES: &[(&str, RouteMeta)] = &[
    ("/login", PUBLIC),
    ("/", AUTHENTICATED),
    ("/dashboard", AUTHENTICATED),
    ("/equipo/:id", AUTHENTICATED),
    ("/reportes", AUTHENTICATED),
    ("/admin/usuarios", ADMIN),
    ("/admin/equipos", ADMIN),
    ("/admin/tareas", ADMIN),
];

fn meta_for(path: &str) -> Option<RouteMeta> {
    PAGE_ROUTES
        .iter()
        .find(|(pattern, _)| *pattern == path)
        .map(|(_, meta)| *meta)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Current session profile, when the request carries a valid session token.
fn session_profile(state: &AppState, headers: &HeaderMap) -> Option<Profile> {
    let token = bearer_token(headers)?;
    if !state.sessions.validate(token) {
        return None;
    }
    state.profiles.get()
}

/// Page navigation guard. Pages redirect instead of rejecting, mirroring how
/// the dashboard routes its views: unauthenticated navigation lands on the
/// login page, non-admins on the landing page, and an authenticated visit to
/// the login page bounces back to the landing page.
pub async fn page_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let meta = match meta_for(&path) {
        Some(meta) => meta,
        None => return next.run(request).await,
    };

    let profile = session_profile(&state, request.headers());

    if meta.requires_auth && profile.is_none() {
        return Redirect::temporary(LOGIN_PATH).into_response();
    }
    if meta.admin_only && !profile.as_ref().map(Profile::is_admin).unwrap_or(false) {
        return Redirect::temporary(LANDING_PATH).into_response();
    }
    if path == LOGIN_PATH && profile.is_some() {
        return Redirect::temporary(LANDING_PATH).into_response();
    }

    next.run(request).await
}

/// Authenticated requester, for the API surface (JSON errors, no redirects).
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Profile);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        if !state.sessions.validate(token) {
            return Err(AppError::unauthorized("invalid session token"));
        }

        let profile = state
            .profiles
            .get()
            .ok_or_else(|| AppError::unauthorized("no active session"))?;
        Ok(CurrentUser(profile))
    }
}
