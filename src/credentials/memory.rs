use super::CredentialStore;
use crate::error::StoreResult;
use crate::types::Credential;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Process-local credential slot. Lost when the process exits.
#[derive(Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a credential already present, as after a previous login.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn store(&self, credential: &Credential) -> StoreResult<()> {
        *self.slot.lock().await = Some(credential.clone());
        Ok(())
    }

    async fn load(&self) -> StoreResult<Option<Credential>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.slot.lock().await.take();
        Ok(())
    }
}
