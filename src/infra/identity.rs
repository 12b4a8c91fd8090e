use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::infra::db::Db;

/// Raw identity-provider credential, distinct from the application Profile.
#[derive(Debug, Clone)]
pub struct Identity {
    pub uid: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve credentials to an identity; None when they do not match.
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<Identity>>;

    /// Invalidate the provider-side session for the given identity.
    async fn sign_out(&self, uid: Uuid) -> Result<()>;
}

pub struct PgIdentity {
    db: Db,
}

impl PgIdentity {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl IdentityProvider for PgIdentity {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<Identity>> {
        let row = sqlx::query(
            "SELECT uid, display_name, password_hash FROM credentials WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        Ok(Some(Identity {
            uid: row.get("uid"),
            email: email.to_string(),
            display_name: row.get("display_name"),
        }))
    }

    async fn sign_out(&self, uid: Uuid) -> Result<()> {
        tracing::debug!(%uid, "identity signed out");
        Ok(())
    }
}

/// In-memory identity backend for `STORE_BACKEND=memory` and tests. Keeps a
/// log of sign-outs so the inactive-account gate is observable.
#[derive(Default)]
pub struct MemoryIdentity {
    users: Mutex<HashMap<String, (Identity, String)>>,
    signed_out: Mutex<Vec<Uuid>>,
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Uuid> {
        let uid = Uuid::new_v4();
        let identity = Identity {
            uid,
            email: email.to_string(),
            display_name: display_name.map(str::to_string),
        };
        let password_hash = hash_password(password)?;
        self.users
            .lock()
            .unwrap()
            .insert(email.to_string(), (identity, password_hash));
        Ok(uid)
    }

    pub fn signed_out(&self) -> Vec<Uuid> {
        self.signed_out.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn authenticate(&self, email: &str, password: &str) -> Result<Option<Identity>> {
        let entry = {
            let users = self.users.lock().unwrap();
            users.get(email).cloned()
        };
        let (identity, password_hash) = match entry {
            Some(entry) => entry,
            None => return Ok(None),
        };
        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }
        Ok(Some(identity))
    }

    async fn sign_out(&self, uid: Uuid) -> Result<()> {
        self.signed_out.lock().unwrap().push(uid);
        Ok(())
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
