use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::infra::prefs::PrefStore;

pub const THEME_PREF_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Light/dark preference. The persisted value wins over the ambient default;
/// persistence failures are non-fatal and leave the in-memory value
/// authoritative for the rest of the session.
#[derive(Clone)]
pub struct ThemeService {
    prefs: Arc<dyn PrefStore>,
    state: Arc<watch::Sender<Theme>>,
}

impl ThemeService {
    pub async fn load(prefs: Arc<dyn PrefStore>, ambient: Theme) -> Self {
        let initial = match prefs.get(THEME_PREF_KEY).await {
            Ok(Some(value)) => Theme::parse(&value).unwrap_or(ambient),
            Ok(None) => ambient,
            Err(err) => {
                tracing::warn!(error = ?err, "failed to read theme preference");
                ambient
            }
        };
        let (sender, _) = watch::channel(initial);
        Self {
            prefs,
            state: Arc::new(sender),
        }
    }

    pub fn current(&self) -> Theme {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Theme> {
        self.state.subscribe()
    }

    pub async fn toggle(&self) -> Theme {
        let next = self.current().toggled();
        self.state.send_replace(next);
        if let Err(err) = self.prefs.put(THEME_PREF_KEY, next.as_str()).await {
            tracing::warn!(error = ?err, "failed to persist theme preference");
        }
        next
    }
}
