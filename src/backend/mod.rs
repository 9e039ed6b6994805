//! Backend Client
//!
//! Typed access to the Synapse inference backend:
//!
//! - `authenticate` - `POST /token`, form-encoded, returns the bearer credential
//! - `upload_document` - `POST /upload`, multipart, returns the indexed document name
//! - `ask` - `POST /ask`, JSON, returns the answer and the model that produced it
//!
//! Each call is one round trip. Nothing here retries, and nothing here writes
//! the credential store.

mod http;
mod wire;

use crate::error::BackendResult;
use crate::types::{Answer, Credential, DocumentAccepted, DocumentScope, DocumentUpload, ModelHint};
use async_trait::async_trait;

pub use http::HttpBackend;
pub use wire::classify_response;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn authenticate(&self, identifier: &str, secret: &str) -> BackendResult<Credential>;

    async fn upload_document(&self, document: &DocumentUpload) -> BackendResult<DocumentAccepted>;

    /// `scope` is forwarded verbatim; `None` asks the backend for an unscoped answer.
    async fn ask(
        &self,
        question: &str,
        model: &ModelHint,
        scope: Option<&DocumentScope>,
    ) -> BackendResult<Answer>;
}
