use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Persisted key-value storage for local preferences.
#[async_trait]
pub trait PrefStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// Preferences persisted as a flat JSON map on disk.
pub struct FilePrefs {
    path: PathBuf,
}

impl FilePrefs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_map(&self) -> Result<HashMap<String, String>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => {
                return Err(anyhow!("failed to read {}: {}", self.path.display(), err))
            }
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl PrefStore for FilePrefs {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map().await?.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value.to_string());
        let data = serde_json::to_vec_pretty(&map)?;
        tokio::fs::write(&self.path, data)
            .await
            .map_err(|err| anyhow!("failed to write {}: {}", self.path.display(), err))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPrefs {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PrefStore for MemoryPrefs {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
