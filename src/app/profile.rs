use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::profile::Profile;

/// Edge observed by a profile replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileTransition {
    /// absent -> present
    SignedIn,
    /// present -> absent
    SignedOut,
    /// present -> present
    Replaced,
    /// absent -> absent
    None,
}

/// Process-wide holder of the authenticated user's profile. The value is
/// replaced wholesale; observers see every replacement through the watch
/// channel, and callers acting on session edges dispatch on the returned
/// transition.
#[derive(Clone)]
pub struct ProfileStore {
    inner: Arc<watch::Sender<Option<Profile>>>,
}

impl ProfileStore {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            inner: Arc::new(sender),
        }
    }

    pub fn get(&self) -> Option<Profile> {
        self.inner.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Profile>> {
        self.inner.subscribe()
    }

    pub fn replace(&self, profile: Option<Profile>) -> ProfileTransition {
        let incoming = profile.is_some();
        let previous = self.inner.send_replace(profile).is_some();
        match (previous, incoming) {
            (false, true) => ProfileTransition::SignedIn,
            (true, false) => ProfileTransition::SignedOut,
            (true, true) => ProfileTransition::Replaced,
            (false, false) => ProfileTransition::None,
        }
    }
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self::new()
    }
}
