use std::time::Duration;

use transport::{CodecError, Seq};

use crate::values::Handle;

/// A single command failed. The session remains usable.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// The debuggee answered with `success: false`.
    #[error("{command} failed: {message}")]
    Failed {
        command: &'static str,
        message: String,
    },

    #[error("{command} response has no body")]
    MissingBody { command: &'static str },

    #[error("malformed {command} response: {source}")]
    MalformedBody {
        command: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The response could not be read as a response at all.
    #[error("malformed response to request {seq}: {message}")]
    MalformedResponse { seq: Seq, message: String },
}

/// Failures scoped to the whole session, or to the caller's wait on it.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("the connection to the debuggee was closed")]
    Disconnected,

    #[error("{0}")]
    ProcessExited(String),

    #[error("transport failure: {0}")]
    Transport(#[from] CodecError),

    #[error("failed to start the debuggee: {0}")]
    Launch(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{command} timed out after {timeout:?}")]
    Timeout {
        command: String,
        timeout: Duration,
    },

    #[error("cancelled")]
    Cancelled,

    /// The value's handle belongs to an earlier break and may have been
    /// recycled by the debuggee.
    #[error("handle {handle} is stale")]
    StaleHandle { handle: Handle },

    #[error("an execution is already outstanding")]
    ExecutionPending,
}

impl SessionError {
    /// Whether the session is unusable after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Disconnected
                | SessionError::ProcessExited(_)
                | SessionError::Transport(_)
                | SessionError::Launch(_)
                | SessionError::Io(_)
        )
    }

    /// A copy suitable for resolving several waiters with the same failure.
    pub(crate) fn duplicate(&self) -> SessionError {
        match self {
            SessionError::ProcessExited(message) => SessionError::ProcessExited(message.clone()),
            SessionError::Launch(message) => SessionError::Launch(message.clone()),
            SessionError::Timeout { command, timeout } => SessionError::Timeout {
                command: command.clone(),
                timeout: *timeout,
            },
            SessionError::Cancelled => SessionError::Cancelled,
            SessionError::StaleHandle { handle } => SessionError::StaleHandle { handle: *handle },
            SessionError::ExecutionPending => SessionError::ExecutionPending,
            SessionError::Disconnected | SessionError::Transport(_) | SessionError::Io(_) => {
                SessionError::Disconnected
            }
        }
    }
}

/// Either scope of failure.
#[derive(Debug, thiserror::Error)]
pub enum DebuggerError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl DebuggerError {
    /// Only session-scoped failures can be fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            DebuggerError::Command(_) => false,
            DebuggerError::Session(e) => e.is_fatal(),
        }
    }
}

impl From<CodecError> for DebuggerError {
    fn from(e: CodecError) -> Self {
        DebuggerError::Session(SessionError::Transport(e))
    }
}

pub type Result<T, E = DebuggerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failures_are_recoverable() {
        let err = DebuggerError::from(CommandError::Failed {
            command: "evaluate",
            message: "ReferenceError: x is not defined".to_string(),
        });
        assert!(!err.is_fatal());
        assert_eq!(
            err.to_string(),
            "evaluate failed: ReferenceError: x is not defined"
        );
    }

    #[test]
    fn transport_failures_are_fatal() {
        assert!(DebuggerError::from(SessionError::Disconnected).is_fatal());
        assert!(DebuggerError::from(SessionError::ProcessExited("gone".into())).is_fatal());
        assert!(!DebuggerError::from(SessionError::Cancelled).is_fatal());
        assert!(!DebuggerError::from(SessionError::StaleHandle { handle: 3 }).is_fatal());
    }
}
