use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use courier_types::{Role, Session};
use thiserror::Error;

pub const KEY_TOKEN: &str = "token";
pub const KEY_DRIVER_ID: &str = "driver_id";
pub const KEY_ROLE: &str = "role";
pub const KEY_PROFILE: &str = "profile";

const SESSION_KEYS: [&str; 4] = [KEY_TOKEN, KEY_DRIVER_ID, KEY_ROLE, KEY_PROFILE];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential store io failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("credential store payload corrupt: {source}")]
    Corrupt {
        #[from]
        source: serde_json::Error,
    },
}

/// Key-value credential persistence. The on-device format belongs to the
/// platform; the core only needs load, save, and clear.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn remove_all(&self, keys: &[&str]) -> Result<(), StoreError>;
}

/// Volatile store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: StdMutex<HashMap<String, String>>,
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

/// Single-file JSON store. Small payload, read-modify-write per operation.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> Result<HashMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        std::fs::write(&self.path, serde_json::to_vec(map)?)?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_map()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut map = self.read_map()?;
        for key in keys {
            map.remove(*key);
        }
        self.write_map(&map)
    }
}

/// Rebuild a session from stored credentials. `None` unless both the token
/// and driver id are present; a missing role degrades to `other`, a corrupt
/// cached profile is dropped.
pub async fn load_session(store: &dyn CredentialStore) -> Result<Option<Session>, StoreError> {
    let token = store.get(KEY_TOKEN).await?;
    let driver_id = store.get(KEY_DRIVER_ID).await?;
    let (Some(token), Some(driver_id)) = (token, driver_id) else {
        return Ok(None);
    };

    let role = store
        .get(KEY_ROLE)
        .await?
        .as_deref()
        .map(Role::parse)
        .unwrap_or(Role::Other);
    let profile = match store.get(KEY_PROFILE).await? {
        Some(text) => serde_json::from_str(&text).ok(),
        None => None,
    };

    let mut session = Session::new(driver_id, token, role);
    session.profile = profile;
    Ok(Some(session))
}

pub async fn save_session(
    store: &dyn CredentialStore,
    session: &Session,
) -> Result<(), StoreError> {
    store.set(KEY_TOKEN, &session.bearer_token).await?;
    store.set(KEY_DRIVER_ID, &session.driver_id).await?;
    store.set(KEY_ROLE, session.role.as_str()).await?;
    if let Some(profile) = &session.profile {
        store
            .set(KEY_PROFILE, &serde_json::to_string(profile)?)
            .await?;
    }
    Ok(())
}

pub async fn clear_session(store: &dyn CredentialStore) -> Result<(), StoreError> {
    store.remove_all(&SESSION_KEYS).await
}
