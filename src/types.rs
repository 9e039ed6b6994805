use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Added to the millisecond timestamp so a user question and the reply
    /// recorded in the same millisecond never share an id.
    fn id_offset(self) -> u64 {
        match self {
            Role::User => 0,
            Role::Assistant => 1,
        }
    }
}

/// How an entry should be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A question or an answer.
    Message,
    /// Greeting and document-scope announcements.
    Notice,
    /// Stands in for an answer that could not be obtained.
    Error,
}

/// Opaque bearer token. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Name of the document the backend has indexed for this session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentScope(String);

impl DocumentScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Model selector forwarded to `/ask` as `model_type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelHint(String);

impl ModelHint {
    pub const DEFAULT: &'static str = "flash";

    pub fn new(hint: impl Into<String>) -> Self {
        Self(hint.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ModelHint {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

/// Monotonic conversation entry id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

impl EntryId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Issues entry ids from wall-clock milliseconds, never repeating and never
/// going backwards even if the clock does.
#[derive(Clone, Debug, Default)]
pub(crate) struct EntryIdClock {
    last: u64,
}

impl EntryIdClock {
    pub(crate) fn next(&mut self, role: Role, at: OffsetDateTime) -> EntryId {
        let millis = (at.unix_timestamp_nanos() / 1_000_000).max(0) as u64;
        let candidate = millis + role.id_offset();
        let id = candidate.max(self.last + 1);
        self.last = id;
        EntryId(id)
    }
}

/// Provenance recorded on an assistant answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerMeta {
    pub model: Option<String>,
    /// Scope in effect when the question was sent.
    pub scope: Option<DocumentScope>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConversationEntry {
    pub id: EntryId,
    pub role: Role,
    pub kind: EntryKind,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub answer: Option<AnswerMeta>,
}

/// A document ready to be sent to `/upload`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read a document from disk, naming it after the file.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.to_string())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a file path: {}", path.display()),
                )
            })?;
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::new(file_name, mime_type, bytes))
    }
}

/// Upload acknowledged by the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentAccepted {
    pub name: DocumentScope,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    pub model_used: Option<String>,
}
