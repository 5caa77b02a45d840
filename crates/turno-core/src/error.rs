use std::fmt;
use std::io;

use uuid::Uuid;

/// Errors raised by the daemon runner itself, before or around the
/// daemon's own iterations.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("failed to spawn daemon thread: {0}")]
    Spawn(#[from] io::Error),
    #[error("daemon bootstrap failed: {0}")]
    Bootstrap(String),
    #[error("daemon thread panicked outside of an iteration")]
    Panicked,
}

pub type DaemonResult<T> = Result<T, DaemonError>;

/// Errors from processing a single pending job handle. The worker logs
/// these and moves on to the next handle.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("failed to start job for message {message_id}: {source}")]
    JobSpawn {
        message_id: Uuid,
        #[source]
        source: io::Error,
    },
}

/// Failure reported by a [`JobExecutor`](crate::queue::JobExecutor).
#[derive(Debug, thiserror::Error)]
#[error("job execution failed: {0}")]
pub struct JobError(pub String);

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A recoverable application fault raised by a valve. Carries the status
/// code the response should surface when nothing else set one.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ValveError {
    pub message: String,
    pub status_code: u16,
}

impl ValveError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_status(message, 500)
    }

    pub fn with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A valve failed; the request is answerable with an error response.
    Application,
    /// The processing context itself broke (panic or equivalent).
    Fatal,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Application => "application",
            FaultKind::Fatal => "fatal",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one failure shape allowed to cross a request-handler boundary.
/// Only plain data: the originating error object never leaves its context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} fault: {message} (status {status_code})")]
pub struct RequestFault {
    pub kind: FaultKind,
    pub message: String,
    pub status_code: u16,
}

impl RequestFault {
    pub fn application(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            kind: FaultKind::Application,
            message: message.into(),
            status_code,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Fatal,
            message: message.into(),
            status_code: 500,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == FaultKind::Fatal
    }
}

impl From<ValveError> for RequestFault {
    fn from(err: ValveError) -> Self {
        RequestFault::application(err.message, err.status_code)
    }
}

/// Session encode/decode failures.
#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    #[error("failed to encode session: {0}")]
    Encode(String),
    #[error("failed to decode session: {0}")]
    Decode(String),
}

/// Failures from the session persistence layer. `DataNotReadable` is the
/// read-side condition that callers self-heal by deleting the file; the
/// other variants propagate from the write path.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("session data not readable: {0}")]
    DataNotReadable(String),
    #[error("session file io: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Marshal(#[from] MarshalError),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valve_error_defaults_to_server_error_status() {
        let err = ValveError::new("boom");
        assert_eq!(err.status_code, 500);
        let fault: RequestFault = err.into();
        assert_eq!(fault.kind, FaultKind::Application);
        assert_eq!(fault.status_code, 500);
        assert_eq!(fault.message, "boom");
    }

    #[test]
    fn request_fault_is_plain_data() {
        fn assert_transportable<T: Clone + Send + 'static>() {}
        assert_transportable::<RequestFault>();

        let fault = RequestFault::fatal("stack blown");
        assert!(fault.is_fatal());
        assert_eq!(fault.to_string(), "fatal fault: stack blown (status 500)");
    }
}
