//! Credential Store Adapter
//!
//! A single named slot holding the bearer credential. The session controller
//! is the only writer; the backend client only reads it to attach the bearer
//! header.

mod file;
mod memory;

use crate::error::StoreResult;
use crate::types::Credential;
use async_trait::async_trait;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

/// Slot the bearer credential lives in. An absent slot means logged out.
pub const CREDENTIAL_SLOT: &str = "user_token";

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Replace the stored credential.
    async fn store(&self, credential: &Credential) -> StoreResult<()>;

    /// `Ok(None)` when nothing has been stored yet.
    async fn load(&self) -> StoreResult<Option<Credential>>;

    /// Remove the stored credential. Clearing an empty slot succeeds.
    async fn clear(&self) -> StoreResult<()>;
}

/// Sanitize a slot name for filesystem use
pub(crate) fn sanitize_slot(slot: &str) -> String {
    slot.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_slot() {
        assert_eq!(sanitize_slot("user_token"), "user_token");
        assert_eq!(sanitize_slot("user:token"), "user_token");
        assert_eq!(sanitize_slot("../../etc/passwd"), "______etc_passwd");
        assert_eq!(sanitize_slot(&"a".repeat(100)).len(), 64);
    }
}
