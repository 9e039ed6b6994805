//! Session Controller
//!
//! Owns authentication state, the document scope and the conversation, and
//! sequences every user intent through the backend client:
//!
//! - `check_persisted_session` - startup gate, restores a stored credential
//! - `login` / `logout` - credential lifecycle; the controller is the only
//!   writer of the credential store
//! - `upload_document` - replaces the document scope on success
//! - `send_message` - appends the question immediately, then the answer or an
//!   error entry once the backend settles
//!
//! The presentation layer observes a [`SessionState`] via [`SessionController::snapshot`]
//! or [`SessionController::subscribe`]; it never mutates it.

mod state;

pub use state::{AuthState, GREETING, InFlight, SessionState, Ticket};

use crate::backend::{Backend, HttpBackend};
use crate::config::ClientConfig;
use crate::credentials::{CREDENTIAL_SLOT, CredentialStore, FileCredentialStore};
use crate::error::{
    BackendResult, ErrorKind, Operation, Precondition, SessionError, SessionResult, StoreResult,
};
use crate::types::{Answer, DocumentAccepted, DocumentScope, DocumentUpload, EntryId, ModelHint};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// A question that has been appended but not yet answered. Dropping it
/// without completing releases the send slot; the question stays in the log.
#[derive(Debug)]
pub struct PendingQuestion<'a> {
    pub entry: EntryId,
    pub question: String,
    /// Scope in effect when the question was issued.
    pub scope: Option<DocumentScope>,
    epoch: u64,
    in_flight: InFlightGuard<'a>,
}

/// An upload that has been issued but not yet acknowledged. Dropping it
/// without completing releases the upload slot.
#[derive(Debug)]
pub struct PendingUpload<'a> {
    epoch: u64,
    in_flight: InFlightGuard<'a>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty or whitespace-only text; nothing was appended.
    Skipped,
    Answered(EntryId),
    /// Settled after the session it was asked in was reset.
    Discarded,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    Scoped { scope: DocumentScope, notice: EntryId },
    /// Settled after the session it was issued in was reset.
    Discarded,
}

pub struct SessionController {
    backend: Arc<dyn Backend>,
    credentials: Arc<dyn CredentialStore>,
    model: ModelHint,
    state: Mutex<SessionState>,
    observers: watch::Sender<SessionState>,
    /// Serializes credential writes with the auth transitions they imply.
    writer: tokio::sync::Mutex<()>,
}

impl SessionController {
    pub fn new(
        backend: Arc<dyn Backend>,
        credentials: Arc<dyn CredentialStore>,
        model: ModelHint,
    ) -> Self {
        let (observers, _) = watch::channel(SessionState::default());
        Self {
            backend,
            credentials,
            model,
            state: Mutex::new(SessionState::default()),
            observers,
            writer: tokio::sync::Mutex::new(()),
        }
    }

    /// Wire the HTTP backend and file credential store described by `config`.
    pub fn from_config(config: &ClientConfig) -> StoreResult<Self> {
        let store = match &config.data_dir {
            Some(dir) => FileCredentialStore::new(dir, CREDENTIAL_SLOT)?,
            None => FileCredentialStore::in_data_dir(CREDENTIAL_SLOT)?,
        };
        tracing::debug!(path = %store.path().display(), "using file credential store");

        let credentials: Arc<dyn CredentialStore> = Arc::new(store);
        let backend = Arc::new(HttpBackend::new(config, credentials.clone()));
        Ok(Self::new(backend, credentials, config.model.clone()))
    }

    // ============================================
    // Observation
    // ============================================

    pub fn snapshot(&self) -> SessionState {
        self.lock().clone()
    }

    /// Receiver updated after every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.observers.subscribe()
    }

    pub fn auth_state(&self) -> AuthState {
        self.lock().auth
    }

    pub fn scope(&self) -> Option<DocumentScope> {
        self.lock().scope.clone()
    }

    pub fn is_busy(&self, op: Operation) -> bool {
        self.lock().is_busy(op)
    }

    // ============================================
    // Authentication
    // ============================================

    /// Restore a persisted credential. Run once before routing the UI.
    pub async fn check_persisted_session(&self) -> SessionResult<AuthState> {
        let _writer = self.writer.lock().await;
        self.mutate(|s| s.auth = AuthState::CheckingPersisted);

        match self.credentials.load().await {
            Ok(Some(_)) => {
                tracing::info!("restored persisted session");
                self.mutate(|s| {
                    s.auth = AuthState::Authenticated;
                    s.reset_session();
                    s.greet();
                });
                Ok(AuthState::Authenticated)
            }
            Ok(None) => {
                tracing::info!("no persisted session");
                self.mutate(|s| s.auth = AuthState::Unauthenticated);
                Ok(AuthState::Unauthenticated)
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not read persisted session");
                self.mutate(|s| s.auth = AuthState::Unknown);
                Err(err.into())
            }
        }
    }

    /// Authenticate and persist the returned credential. On failure nothing is
    /// stored and the auth state is left as it was.
    pub async fn login(&self, identifier: &str, secret: &str) -> SessionResult<()> {
        if identifier.trim().is_empty() || secret.is_empty() {
            return Err(Precondition::EmptyCredentials.into());
        }
        let ticket = self.start(Operation::Login)?;
        let _in_flight = InFlightGuard::new(self, Operation::Login, ticket);

        let credential = match self.backend.authenticate(identifier, secret).await {
            Ok(credential) => credential,
            Err(err) => {
                tracing::info!(kind = ?err.kind(), error = %err, "login failed");
                return Err(err.into());
            }
        };

        let _writer = self.writer.lock().await;
        self.credentials.store(&credential).await?;
        self.mutate(|s| {
            s.auth = AuthState::Authenticated;
            s.reset_session();
            s.greet();
        });
        tracing::info!("logged in");
        Ok(())
    }

    /// Forget the credential, the document scope and the conversation.
    /// Never fails; a store error is logged.
    pub async fn logout(&self) {
        let _writer = self.writer.lock().await;
        if let Err(err) = self.credentials.clear().await {
            tracing::warn!(error = %err, "failed to clear credential on logout");
        }
        self.mutate(|s| {
            s.auth = AuthState::Unauthenticated;
            s.reset_session();
        });
        tracing::info!("logged out");
    }

    /// The backend rejected the credential: drop it and require a new login.
    /// Scope and conversation stay as they are.
    async fn expire_session(&self, epoch: u64) {
        let _writer = self.writer.lock().await;
        let current = self.lock().epoch;
        if current != epoch {
            return;
        }
        if let Err(err) = self.credentials.clear().await {
            tracing::warn!(error = %err, "failed to clear expired credential");
        }
        self.mutate(|s| {
            if s.epoch == epoch {
                s.auth = AuthState::Unauthenticated;
            }
        });
        tracing::info!("credential expired; re-authentication required");
    }

    // ============================================
    // Document scope
    // ============================================

    pub async fn upload_document(&self, document: DocumentUpload) -> SessionResult<UploadOutcome> {
        let pending = self.begin_upload()?;

        tracing::info!(file = %document.file_name, bytes = document.bytes.len(), "uploading document");
        let result = self.backend.upload_document(&document).await;
        self.complete_upload(pending, result).await
    }

    /// First half of an upload: check the session and mark the upload in flight.
    pub fn begin_upload(&self) -> SessionResult<PendingUpload<'_>> {
        self.mutate(|s| {
            if s.auth != AuthState::Authenticated {
                return Err(SessionError::from(Precondition::NotAuthenticated));
            }
            let Some(ticket) = s.in_flight.start(Operation::Upload) else {
                return Err(Precondition::Busy(Operation::Upload).into());
            };
            Ok(PendingUpload {
                epoch: s.epoch,
                in_flight: InFlightGuard::new(self, Operation::Upload, ticket),
            })
        })
    }

    /// Second half of an upload: apply the backend's verdict. A failure leaves
    /// scope and conversation untouched.
    pub async fn complete_upload(
        &self,
        pending: PendingUpload<'_>,
        result: BackendResult<DocumentAccepted>,
    ) -> SessionResult<UploadOutcome> {
        let applied = self.mutate(|s| {
            s.in_flight.finish(Operation::Upload, pending.in_flight.ticket);
            if s.epoch != pending.epoch {
                return None;
            }
            Some(match &result {
                Ok(accepted) => Some(s.set_scope(accepted.name.clone())),
                Err(_) => None,
            })
        });

        let Some(notice) = applied else {
            tracing::debug!("dropping upload result from a previous session");
            return Ok(UploadOutcome::Discarded);
        };

        match (result, notice) {
            (Ok(accepted), Some(notice)) => {
                tracing::info!(scope = %accepted.name, "document scope set");
                Ok(UploadOutcome::Scoped {
                    scope: accepted.name,
                    notice,
                })
            }
            (Err(err), _) => {
                tracing::warn!(kind = ?err.kind(), error = %err, "upload failed");
                if err.kind() == ErrorKind::ExpiredOrInvalidCredential {
                    self.expire_session(pending.epoch).await;
                }
                Err(err.into())
            }
            (Ok(_), None) => Ok(UploadOutcome::Discarded),
        }
    }

    // ============================================
    // Conversation
    // ============================================

    /// Ask a question about the scoped document.
    ///
    /// The question is appended before the backend is called and stays in
    /// the log whatever the outcome. A failure appends an error entry and is
    /// also returned.
    pub async fn send_message(&self, text: &str) -> SessionResult<SendOutcome> {
        let Some(pending) = self.begin_send(text)? else {
            return Ok(SendOutcome::Skipped);
        };

        let result = self
            .backend
            .ask(&pending.question, &self.model, pending.scope.as_ref())
            .await;
        self.complete_send(pending, result).await
    }

    /// First half of a send: append the user's question and capture the
    /// current scope. `Ok(None)` for blank text. The text is kept as typed.
    pub fn begin_send(&self, text: &str) -> SessionResult<Option<PendingQuestion<'_>>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        self.mutate(|s| {
            if s.auth != AuthState::Authenticated {
                return Err(SessionError::from(Precondition::NotAuthenticated));
            }
            let Some(ticket) = s.in_flight.start(Operation::Send) else {
                return Err(Precondition::Busy(Operation::Send).into());
            };
            let entry = s.ask_question(text);
            Ok(Some(PendingQuestion {
                entry,
                question: text.to_string(),
                scope: s.scope.clone(),
                epoch: s.epoch,
                in_flight: InFlightGuard::new(self, Operation::Send, ticket),
            }))
        })
    }

    /// Second half of a send: append the answer, or an error entry in its place.
    pub async fn complete_send(
        &self,
        pending: PendingQuestion<'_>,
        result: BackendResult<Answer>,
    ) -> SessionResult<SendOutcome> {
        let recorded = self.mutate(|s| {
            s.in_flight.finish(Operation::Send, pending.in_flight.ticket);
            if s.epoch != pending.epoch {
                return None;
            }
            Some(match &result {
                Ok(answer) => s.record_answer(answer, pending.scope.clone()),
                Err(err) => s.record_failure(err),
            })
        });

        let Some(entry) = recorded else {
            tracing::debug!(question = %pending.entry, "dropping answer from a previous session");
            return Ok(SendOutcome::Discarded);
        };

        match result {
            Ok(answer) => {
                tracing::debug!(
                    entry = %entry,
                    model = answer.model_used.as_deref().unwrap_or("unknown"),
                    scoped = pending.scope.is_some(),
                    "answer recorded"
                );
                Ok(SendOutcome::Answered(entry))
            }
            Err(err) => {
                tracing::warn!(kind = ?err.kind(), error = %err, "question failed");
                if err.kind() == ErrorKind::ExpiredOrInvalidCredential {
                    self.expire_session(pending.epoch).await;
                }
                Err(SessionError::Backend(err))
            }
        }
    }

    // ============================================
    // State plumbing
    // ============================================

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a transition and publish the new state while still holding the
    /// lock, so observers see transitions in order.
    fn mutate<R>(&self, transition: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.lock();
        let out = transition(&mut state);
        self.observers.send_replace(state.clone());
        out
    }

    fn start(&self, op: Operation) -> SessionResult<Ticket> {
        self.mutate(|s| s.in_flight.start(op))
            .ok_or_else(|| Precondition::Busy(op).into())
    }
}

/// Clears an in-flight flag even if the future driving the call is dropped.
struct InFlightGuard<'a> {
    controller: &'a SessionController,
    op: Operation,
    ticket: Ticket,
}

impl<'a> InFlightGuard<'a> {
    fn new(controller: &'a SessionController, op: Operation, ticket: Ticket) -> Self {
        Self {
            controller,
            op,
            ticket,
        }
    }
}

impl std::fmt::Debug for InFlightGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightGuard")
            .field("op", &self.op)
            .field("ticket", &self.ticket)
            .finish()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let (op, ticket) = (self.op, self.ticket);
        self.controller.mutate(|s| s.in_flight.finish(op, ticket));
    }
}
