use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::Json;
use futures::try_join;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app::theme::Theme;
use crate::domain::equipment::Equipment;
use crate::domain::maintenance::ScheduledMaintenance;
use crate::domain::notification::Notification;
use crate::domain::profile::Profile;
use crate::http::guard::{CurrentUser, LANDING_PATH};
use crate::http::AppError;
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.store.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub profile: Profile,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("email and password are required"));
    }

    let identity = state
        .identity
        .authenticate(&payload.email, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to authenticate");
            AppError::internal("failed to authenticate")
        })?;
    let identity = match identity {
        Some(identity) => identity,
        None => return Err(AppError::unauthorized("invalid credentials")),
    };

    // A new sign-in replaces any active session.
    if state.profiles.get().is_some() {
        state.sessions.revoke();
        state.bridge.handle_signed_out().await;
    }

    let profile = state
        .bridge
        .handle_signed_in(identity)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to resolve sign-in");
            AppError::internal("failed to resolve sign-in")
        })?;
    let profile = match profile {
        Some(profile) => profile,
        None => return Err(AppError::forbidden("account is inactive")),
    };

    let token = state.sessions.issue();
    Ok(Json(LoginResponse { token, profile }))
}

pub async fn logout(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.sessions.revoke();
    if let Err(err) = state.identity.sign_out(user.0.uid).await {
        tracing::warn!(error = ?err, "identity sign-out failed");
    }
    state.bridge.handle_signed_out().await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn current_user(user: CurrentUser) -> Json<Profile> {
    Json(user.0)
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct NotificationsResponse {
    pub items: Vec<Notification>,
    pub unread: usize,
}

pub async fn list_notifications(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Json<NotificationsResponse> {
    // No-op while the session guard is set; re-attempts a failed pass when
    // REGENERATE_AFTER_FAILURE re-armed it.
    if let Err(err) = state.engine.generate_pending(&user.0).await {
        tracing::error!(error = ?err, "failed to generate pending reminders");
    }
    let feed = state.engine.snapshot();
    Json(NotificationsResponse {
        items: feed.items,
        unread: feed.unread,
    })
}

pub async fn mark_all_read(
    user: CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.engine.mark_all_read(&user.0).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to mark notifications read");
        AppError::internal("failed to mark notifications read")
    })?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Theme
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ThemeResponse {
    pub theme: Theme,
}

pub async fn get_theme(State(state): State<AppState>) -> Json<ThemeResponse> {
    Json(ThemeResponse {
        theme: state.theme.current(),
    })
}

pub async fn toggle_theme(State(state): State<AppState>) -> Json<ThemeResponse> {
    Json(ThemeResponse {
        theme: state.theme.toggle().await,
    })
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

pub async fn root() -> Redirect {
    Redirect::temporary(LANDING_PATH)
}

#[derive(Serialize)]
pub struct PageInfo {
    pub view: &'static str,
}

pub async fn login_page() -> Json<PageInfo> {
    Json(PageInfo { view: "login" })
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub equipment: Vec<Equipment>,
    pub upcoming: Vec<ScheduledMaintenance>,
    pub unread: usize,
}

pub async fn dashboard(
    _user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, AppError> {
    let today = OffsetDateTime::now_utc().date();
    let cutoff = today + Duration::days(state.reminder_window_days);

    let (equipment, upcoming) = try_join!(
        state.store.active_equipment(),
        state.store.scheduled_maintenance_due(cutoff),
    )
    .map_err(|err| {
        tracing::error!(error = ?err, "failed to load dashboard");
        AppError::internal("failed to load dashboard")
    })?;

    Ok(Json(DashboardResponse {
        equipment,
        upcoming,
        unread: state.engine.snapshot().unread,
    }))
}

#[derive(Serialize)]
pub struct EquipmentDetailResponse {
    pub equipment: Equipment,
    pub maintenance: Vec<ScheduledMaintenance>,
}

pub async fn equipment_detail(
    _user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EquipmentDetailResponse>, AppError> {
    let equipment = state
        .store
        .find_equipment(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, equipment_id = %id, "failed to load equipment");
            AppError::internal("failed to load equipment")
        })?
        .ok_or_else(|| AppError::not_found("equipment not found"))?;

    let maintenance = state
        .store
        .scheduled_for_equipment(id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, equipment_id = %id, "failed to load maintenance");
            AppError::internal("failed to load maintenance")
        })?;

    Ok(Json(EquipmentDetailResponse {
        equipment,
        maintenance,
    }))
}

#[derive(Serialize)]
pub struct ReportsResponse {
    pub maintenance: Vec<ScheduledMaintenance>,
}

pub async fn reports(
    _user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ReportsResponse>, AppError> {
    let maintenance = state
        .store
        .list_scheduled_maintenance()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to load reports");
            AppError::internal("failed to load reports")
        })?;
    Ok(Json(ReportsResponse { maintenance }))
}

pub async fn admin_users(
    _user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Profile>>, AppError> {
    let profiles = state.store.list_profiles().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list profiles");
        AppError::internal("failed to list profiles")
    })?;
    Ok(Json(profiles))
}

pub async fn admin_equipment(
    _user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Equipment>>, AppError> {
    let equipment = state.store.list_equipment().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list equipment");
        AppError::internal("failed to list equipment")
    })?;
    Ok(Json(equipment))
}

pub async fn admin_tasks(
    _user: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<ScheduledMaintenance>>, AppError> {
    let maintenance = state
        .store
        .list_scheduled_maintenance()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list scheduled maintenance");
            AppError::internal("failed to list scheduled maintenance")
        })?;
    Ok(Json(maintenance))
}
