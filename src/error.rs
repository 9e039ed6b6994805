//! Error taxonomy shared by the store, backend client and session controller.

use std::fmt;

/// Coarse classification every failure maps onto.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response from the backend.
    Unreachable,
    /// Non-2xx response (other than 401) or an undecodable success body.
    RejectedRequest,
    /// 401 from the backend.
    ExpiredOrInvalidCredential,
    /// Rejected by the controller before any network traffic.
    LocalPrecondition,
}

/// Failures of a single backend round trip.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Server unreachable: {0}")]
    Unreachable(String),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Credential expired or invalid")]
    ExpiredOrInvalidCredential,

    #[error("Unexpected response from server: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BackendError::Unreachable(_) => ErrorKind::Unreachable,
            BackendError::Rejected { .. } | BackendError::InvalidResponse(_) => {
                ErrorKind::RejectedRequest
            }
            BackendError::ExpiredOrInvalidCredential => ErrorKind::ExpiredOrInvalidCredential,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else {
            BackendError::Unreachable(err.to_string())
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Failures of the credential store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Credential store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid credential slot name: {0:?}")]
    InvalidSlot(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// User-triggered operations that may be in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    Upload,
    Send,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::Login => "login",
            Operation::Upload => "upload",
            Operation::Send => "send",
        };
        f.write_str(label)
    }
}

/// Local checks that reject an operation before it reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Precondition {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Email and password are required")]
    EmptyCredentials,

    #[error("A {0} is already in progress")]
    Busy(Operation),
}

/// Failure surfaced by a session controller operation.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Precondition(#[from] Precondition),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Store failures are local to the device and reported as preconditions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Precondition(_) | SessionError::Store(_) => ErrorKind::LocalPrecondition,
            SessionError::Backend(err) => err.kind(),
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Invalid client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_kinds() {
        assert_eq!(
            BackendError::Unreachable("refused".into()).kind(),
            ErrorKind::Unreachable
        );
        assert_eq!(
            BackendError::Rejected {
                status: 500,
                message: "boom".into()
            }
            .kind(),
            ErrorKind::RejectedRequest
        );
        assert_eq!(
            BackendError::InvalidResponse("not json".into()).kind(),
            ErrorKind::RejectedRequest
        );
        assert_eq!(
            BackendError::ExpiredOrInvalidCredential.kind(),
            ErrorKind::ExpiredOrInvalidCredential
        );
    }

    #[test]
    fn test_session_error_kinds() {
        let busy = SessionError::from(Precondition::Busy(Operation::Send));
        assert_eq!(busy.kind(), ErrorKind::LocalPrecondition);
        assert_eq!(busy.to_string(), "A send is already in progress");

        let expired = SessionError::from(BackendError::ExpiredOrInvalidCredential);
        assert_eq!(expired.kind(), ErrorKind::ExpiredOrInvalidCredential);
    }
}
