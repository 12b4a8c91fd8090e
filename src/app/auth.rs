use std::sync::{Arc, Mutex};

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::app::notifications::NotificationEngine;
use crate::app::profile::{ProfileStore, ProfileTransition};
use crate::domain::profile::{AccountStatus, Profile, Role};
use crate::infra::identity::{Identity, IdentityProvider};
use crate::infra::store::MaintenanceStore;

/// Resolves identity-provider events into Profile Store state and drives the
/// notification engine on session edges.
pub struct AuthBridge {
    store: Arc<dyn MaintenanceStore>,
    identity: Arc<dyn IdentityProvider>,
    profiles: ProfileStore,
    engine: Arc<NotificationEngine>,
}

impl AuthBridge {
    pub fn new(
        store: Arc<dyn MaintenanceStore>,
        identity: Arc<dyn IdentityProvider>,
        profiles: ProfileStore,
        engine: Arc<NotificationEngine>,
    ) -> Self {
        Self {
            store,
            identity,
            profiles,
            engine,
        }
    }

    /// Sign-in event: resolve the profile record, gate inactive accounts,
    /// populate the Profile Store. Returns None when the account is inactive,
    /// in which case the identity is signed out again and the store stays
    /// clear.
    pub async fn handle_signed_in(&self, identity: Identity) -> Result<Option<Profile>> {
        let profile = match self.store.find_profile(identity.uid).await? {
            Some(profile) if profile.status == AccountStatus::Inactive => {
                self.identity.sign_out(identity.uid).await?;
                self.profiles.replace(None);
                return Ok(None);
            }
            Some(profile) => profile,
            None => synthesize_profile(&identity),
        };

        let transition = self.profiles.replace(Some(profile.clone()));
        if transition == ProfileTransition::SignedIn {
            self.engine.start_session(&profile).await?;
            // A failed pass must not fail the sign-in, the session simply
            // starts without fresh reminders.
            if let Err(err) = self.engine.generate_pending(&profile).await {
                tracing::error!(error = ?err, "failed to generate pending reminders");
            }
        }
        Ok(Some(profile))
    }

    /// Sign-out event: clear the Profile Store, tearing the engine session
    /// down on the present->absent edge.
    pub async fn handle_signed_out(&self) {
        if self.profiles.replace(None) == ProfileTransition::SignedOut {
            self.engine.end_session();
        }
    }
}

/// Default profile for identities without a stored record. Never persisted
/// back by this routine.
fn synthesize_profile(identity: &Identity) -> Profile {
    let display_name = identity
        .display_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| {
            identity
                .email
                .split('@')
                .next()
                .unwrap_or(&identity.email)
                .to_string()
        });
    Profile {
        uid: identity.uid,
        email: identity.email.clone(),
        display_name,
        role: Role::Technician,
        status: AccountStatus::Active,
    }
}

/// Single active bearer session. Only the token hash is retained; comparison
/// is constant-time.
#[derive(Clone, Default)]
pub struct SessionGate {
    active: Arc<Mutex<Option<String>>>,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token, replacing any active session.
    pub fn issue(&self) -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = STANDARD.encode(bytes);
        *self.active.lock().unwrap() = Some(hash_token(&token));
        token
    }

    pub fn validate(&self, token: &str) -> bool {
        let hashed = hash_token(token);
        match self.active.lock().unwrap().as_ref() {
            Some(active) => active.as_bytes().ct_eq(hashed.as_bytes()).into(),
            None => false,
        }
    }

    pub fn revoke(&self) {
        *self.active.lock().unwrap() = None;
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
