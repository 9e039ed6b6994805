use crate::error::{BackendError, Operation};
use crate::types::{
    Answer, AnswerMeta, ConversationEntry, DocumentScope, EntryId, EntryIdClock, EntryKind, Role,
};
use time::OffsetDateTime;

pub const GREETING: &str =
    "Hi! I'm Synapse AI. Upload a PDF first, then ask your question about it! 🧠";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthState {
    /// The persisted credential could not be read.
    Unknown,
    #[default]
    CheckingPersisted,
    Authenticated,
    Unauthenticated,
}

impl AuthState {
    /// Whether the next user action should be routed to the login screen.
    pub fn requires_login(self) -> bool {
        matches!(self, AuthState::Unknown | AuthState::Unauthenticated)
    }
}

/// Identifies one in-flight call so only that call can clear its own flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

/// Operations currently awaiting the backend.
#[derive(Clone, Debug, Default)]
pub struct InFlight {
    login: Option<Ticket>,
    upload: Option<Ticket>,
    send: Option<Ticket>,
    issued: u64,
}

impl InFlight {
    pub fn is_busy(&self, op: Operation) -> bool {
        self.slot(op).is_some()
    }

    pub(crate) fn start(&mut self, op: Operation) -> Option<Ticket> {
        if self.is_busy(op) {
            return None;
        }
        self.issued += 1;
        let ticket = Ticket(self.issued);
        *self.slot_mut(op) = Some(ticket);
        Some(ticket)
    }

    pub(crate) fn finish(&mut self, op: Operation, ticket: Ticket) {
        let slot = self.slot_mut(op);
        if *slot == Some(ticket) {
            *slot = None;
        }
    }

    /// Calls issued by a finished session no longer block the new one.
    fn release_session_calls(&mut self) {
        self.upload = None;
        self.send = None;
    }

    fn slot(&self, op: Operation) -> &Option<Ticket> {
        match op {
            Operation::Login => &self.login,
            Operation::Upload => &self.upload,
            Operation::Send => &self.send,
        }
    }

    fn slot_mut(&mut self, op: Operation) -> &mut Option<Ticket> {
        match op {
            Operation::Login => &mut self.login,
            Operation::Upload => &mut self.upload,
            Operation::Send => &mut self.send,
        }
    }
}

/// Everything the presentation layer needs to render a session.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub auth: AuthState,
    pub scope: Option<DocumentScope>,
    pub conversation: Vec<ConversationEntry>,
    pub in_flight: InFlight,
    /// Bumped on every session reset; results issued under an older epoch are dropped.
    pub(crate) epoch: u64,
    ids: EntryIdClock,
}

impl SessionState {
    pub fn is_busy(&self, op: Operation) -> bool {
        self.in_flight.is_busy(op)
    }

    /// Drop scope and conversation and start a new epoch.
    pub(crate) fn reset_session(&mut self) {
        self.epoch += 1;
        self.scope = None;
        self.conversation.clear();
        self.in_flight.release_session_calls();
    }

    pub(crate) fn greet(&mut self) -> EntryId {
        self.append(Role::Assistant, EntryKind::Notice, GREETING.to_string(), None)
    }

    pub(crate) fn ask_question(&mut self, question: &str) -> EntryId {
        self.append(Role::User, EntryKind::Message, question.to_string(), None)
    }

    /// Record an answer against the scope captured when it was asked.
    pub(crate) fn record_answer(&mut self, answer: &Answer, scope: Option<DocumentScope>) -> EntryId {
        let meta = AnswerMeta {
            model: answer.model_used.clone(),
            scope,
        };
        self.append(
            Role::Assistant,
            EntryKind::Message,
            answer.text.clone(),
            Some(meta),
        )
    }

    pub(crate) fn record_failure(&mut self, err: &BackendError) -> EntryId {
        self.append(
            Role::Assistant,
            EntryKind::Error,
            failure_text(err).to_string(),
            None,
        )
    }

    pub(crate) fn set_scope(&mut self, scope: DocumentScope) -> EntryId {
        let notice = format!(
            "📄 I've read \"{}\". From now on I'll only answer questions about this file.",
            scope
        );
        self.scope = Some(scope);
        self.append(Role::Assistant, EntryKind::Notice, notice, None)
    }

    fn append(
        &mut self,
        role: Role,
        kind: EntryKind,
        text: String,
        answer: Option<AnswerMeta>,
    ) -> EntryId {
        let created_at = OffsetDateTime::now_utc();
        let id = self.ids.next(role, created_at);
        self.conversation.push(ConversationEntry {
            id,
            role,
            kind,
            text,
            created_at,
            answer,
        });
        id
    }
}

fn failure_text(err: &BackendError) -> &'static str {
    match err {
        BackendError::ExpiredOrInvalidCredential => {
            "⚠️ Your session has expired. Please sign in again."
        }
        BackendError::Unreachable(_) => "⚠️ Connection error! Is the backend server running?",
        BackendError::Rejected { .. } | BackendError::InvalidResponse(_) => {
            "⚠️ Something went wrong while answering. Please try again."
        }
    }
}
