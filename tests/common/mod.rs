//! Scripted backend and fixtures shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use synapse::backend::Backend;
use synapse::credentials::MemoryCredentialStore;
use synapse::error::{BackendError, BackendResult};
use synapse::session::SessionController;
use synapse::types::{
    Answer, Credential, DocumentAccepted, DocumentScope, DocumentUpload, ModelHint,
};
use tokio::sync::Notify;

/// Backend that replays queued responses and records what it was asked.
#[derive(Default)]
pub struct ScriptedBackend {
    logins: Mutex<VecDeque<BackendResult<Credential>>>,
    uploads: Mutex<VecDeque<BackendResult<DocumentAccepted>>>,
    answers: Mutex<VecDeque<BackendResult<Answer>>>,
    asked: Mutex<Vec<(String, Option<DocumentScope>)>>,
    calls: AtomicUsize,
    ask_gate: Option<Arc<Notify>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// `ask` waits for a notification on `gate` before answering.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            ask_gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn push_login(&self, result: BackendResult<Credential>) {
        self.logins.lock().unwrap().push_back(result);
    }

    pub fn push_upload(&self, result: BackendResult<DocumentAccepted>) {
        self.uploads.lock().unwrap().push_back(result);
    }

    pub fn push_answer(&self, result: BackendResult<Answer>) {
        self.answers.lock().unwrap().push_back(result);
    }

    /// Questions received so far with the scope each was sent under.
    pub fn asked(&self) -> Vec<(String, Option<DocumentScope>)> {
        self.asked.lock().unwrap().clone()
    }

    /// Total number of backend calls of any kind.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn unscripted() -> BackendError {
    BackendError::Unreachable("no scripted response".to_string())
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn authenticate(&self, _identifier: &str, _secret: &str) -> BackendResult<Credential> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.logins.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted()))
    }

    async fn upload_document(&self, _document: &DocumentUpload) -> BackendResult<DocumentAccepted> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.uploads.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted()))
    }

    async fn ask(
        &self,
        question: &str,
        _model: &ModelHint,
        scope: Option<&DocumentScope>,
    ) -> BackendResult<Answer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.asked
            .lock()
            .unwrap()
            .push((question.to_string(), scope.cloned()));
        if let Some(gate) = &self.ask_gate {
            gate.notified().await;
        }
        let next = self.answers.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(unscripted()))
    }
}

pub fn answer(text: &str, model: &str) -> BackendResult<Answer> {
    Ok(Answer {
        text: text.to_string(),
        model_used: Some(model.to_string()),
    })
}

pub fn accepted(name: &str) -> BackendResult<DocumentAccepted> {
    Ok(DocumentAccepted {
        name: DocumentScope::new(name),
    })
}

pub fn document(name: &str) -> DocumentUpload {
    DocumentUpload::new(name, "application/pdf", b"%PDF-1.4 test".to_vec())
}

pub fn controller(
    backend: &Arc<ScriptedBackend>,
    store: &Arc<MemoryCredentialStore>,
) -> SessionController {
    SessionController::new(backend.clone(), store.clone(), ModelHint::default())
}

/// Controller restored from a persisted credential, as after an earlier login.
pub async fn signed_in(
    backend: &Arc<ScriptedBackend>,
) -> (SessionController, Arc<MemoryCredentialStore>) {
    let store = Arc::new(MemoryCredentialStore::with_credential(Credential::new(
        "persisted-token",
    )));
    let session = controller(backend, &store);
    session
        .check_persisted_session()
        .await
        .expect("persisted session should load");
    (session, store)
}
