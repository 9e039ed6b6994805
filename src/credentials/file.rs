use super::{CredentialStore, sanitize_slot};
use crate::error::{StoreError, StoreResult};
use crate::types::Credential;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Credential slot persisted as a single file.
///
/// Writes land in a temporary sibling that is renamed over the slot, so a
/// reader sees either the previous credential or the new one, never a torn
/// write.
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Store the slot under `dir`.
    pub fn new(dir: impl AsRef<Path>, slot: &str) -> StoreResult<Self> {
        let safe_slot = sanitize_slot(slot);
        if safe_slot.is_empty() {
            return Err(StoreError::InvalidSlot(slot.to_string()));
        }
        Ok(Self {
            path: dir.as_ref().join(safe_slot),
            lock: Mutex::new(()),
        })
    }

    /// Store the slot under the platform's local data directory.
    pub fn in_data_dir(slot: &str) -> StoreResult<Self> {
        Self::new(default_storage_dir(), slot)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

/// Get the storage directory for credentials
fn default_storage_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("synapse").join("credentials");
    }

    PathBuf::from("cache").join("credentials")
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn store(&self, credential: &Credential) -> StoreResult<()> {
        let _guard = self.lock.lock().await;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let staging = self.staging_path();
        // A leftover from an interrupted write may carry looser permissions.
        let _ = fs::remove_file(&staging).await;
        write_private(&staging, credential.secret().as_bytes()).await?;
        if let Err(err) = fs::rename(&staging, &self.path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(err.into());
        }

        tracing::debug!(path = %self.path.display(), "credential stored");
        Ok(())
    }

    async fn load(&self) -> StoreResult<Option<Credential>> {
        let _guard = self.lock.lock().await;

        match fs::read_to_string(&self.path).await {
            Ok(raw) => {
                let token = raw.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(Credential::new(token)))
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        let _guard = self.lock.lock().await;

        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "credential cleared");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(unix)]
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    file.write_all(contents).await?;
    file.sync_all().await
}

#[cfg(not(unix))]
async fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents).await
}
