//! Credential storage shared by every part of a client session
//!
//! The store is a flat string key/value map holding the access token, the
//! refresh token and the signed-in user's profile JSON. Reads and writes are
//! not coordinated across callers: two requests refreshing at the same time
//! will each overwrite the other's tokens unless the gateway serializes them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Key of the access token (a JWT)
pub const TOKEN_KEY: &str = "token";
/// Key of the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Key of the signed-in user's profile, stored as JSON text
pub const USER_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;
    async fn remove(&self, key: &str) -> StoreResult<()>;

    async fn access_token(&self) -> StoreResult<Option<String>> {
        self.get(TOKEN_KEY).await
    }

    async fn refresh_token(&self) -> StoreResult<Option<String>> {
        self.get(REFRESH_TOKEN_KEY).await
    }

    async fn user(&self) -> StoreResult<Option<String>> {
        self.get(USER_KEY).await
    }

    /// Store a renewed access token, and the refresh token when one was issued
    async fn store_tokens(&self, token: &str, refresh_token: Option<&str>) -> StoreResult<()> {
        if let Some(refresh_token) = refresh_token {
            self.set(REFRESH_TOKEN_KEY, refresh_token).await?;
        }
        self.set(TOKEN_KEY, token).await
    }

    /// Drop the access and refresh tokens, keeping the stored user
    async fn clear_tokens(&self) -> StoreResult<()> {
        self.remove(TOKEN_KEY).await?;
        self.remove(REFRESH_TOKEN_KEY).await
    }

    /// Drop everything the session stored
    async fn clear_session(&self) -> StoreResult<()> {
        self.clear_tokens().await?;
        self.remove(USER_KEY).await
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with entries
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn store_tokens(&self, token: &str, refresh_token: Option<&str>) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(TOKEN_KEY.to_string(), token.to_string());
        if let Some(refresh_token) = refresh_token {
            entries.insert(REFRESH_TOKEN_KEY.to_string(), refresh_token.to_string());
        }
        Ok(())
    }
}

/// Store persisted as a single JSON object on disk
///
/// A missing file reads as an empty store. Every write rewrites the whole
/// object through a temporary file and a rename.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StoreResult<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, entries: &HashMap<String, String>) -> StoreResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, serde_json::to_vec_pretty(entries)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn update<F>(&self, mutate: F) -> StoreResult<()>
    where
        F: FnOnce(&mut HashMap<String, String>) -> bool + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        if mutate(&mut entries) {
            self.save(&entries).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
        .await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.update(|entries| entries.remove(key).is_some()).await
    }

    /// Both tokens land in the file with a single rename
    async fn store_tokens(&self, token: &str, refresh_token: Option<&str>) -> StoreResult<()> {
        self.update(|entries| {
            entries.insert(TOKEN_KEY.to_string(), token.to_string());
            if let Some(refresh_token) = refresh_token {
                entries.insert(REFRESH_TOKEN_KEY.to_string(), refresh_token.to_string());
            }
            true
        })
        .await
    }
}
