pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::app::auth::{AuthBridge, SessionGate};
use crate::app::notifications::NotificationEngine;
use crate::app::profile::ProfileStore;
use crate::app::theme::{Theme, ThemeService};
use crate::config::AppConfig;
use crate::infra::identity::IdentityProvider;
use crate::infra::prefs::PrefStore;
use crate::infra::store::MaintenanceStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MaintenanceStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: ProfileStore,
    pub engine: Arc<NotificationEngine>,
    pub bridge: Arc<AuthBridge>,
    pub theme: ThemeService,
    pub sessions: SessionGate,
    pub reminder_window_days: i64,
}

impl AppState {
    /// Wires the service graph over the given backends.
    pub async fn build(
        store: Arc<dyn MaintenanceStore>,
        identity: Arc<dyn IdentityProvider>,
        prefs: Arc<dyn PrefStore>,
        config: &AppConfig,
    ) -> Result<Self> {
        let ambient = Theme::parse(&config.default_theme)
            .ok_or_else(|| anyhow!("invalid DEFAULT_THEME: {}", config.default_theme))?;
        let theme = ThemeService::load(prefs, ambient).await;

        let profiles = ProfileStore::new();
        let engine = Arc::new(NotificationEngine::new(
            Arc::clone(&store),
            config.reminder_window_days,
            config.regenerate_after_failure,
        ));
        let bridge = Arc::new(AuthBridge::new(
            Arc::clone(&store),
            Arc::clone(&identity),
            profiles.clone(),
            Arc::clone(&engine),
        ));

        Ok(Self {
            store,
            identity,
            profiles,
            engine,
            bridge,
            theme,
            sessions: SessionGate::new(),
            reminder_window_days: config.reminder_window_days,
        })
    }
}
