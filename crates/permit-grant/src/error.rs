//! Grant protocol error types.

use permit_store::StoreError;
use permit_types::ErrorCode;
use thiserror::Error;

/// Errors from the escalation flow or the helper.
#[derive(Debug, Error)]
pub enum GrantError {
    /// A line on the helper/backend wire did not parse.
    #[error("malformed protocol line: '{line}'")]
    Protocol {
        /// The offending line.
        line: String,
    },

    /// The helper (or backend) process could not be spawned.
    #[error("could not spawn '{command}': {source}")]
    Spawn {
        /// The command that failed to start.
        command: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The helper exited without a terminal SUCCESS/FAILURE line.
    #[error("helper ended the conversation without a verdict")]
    NoVerdict,

    /// I/O on the helper/backend pipes failed.
    #[error("grant conversation i/o failed: {source}")]
    Io {
        /// Underlying error.
        #[from]
        source: std::io::Error,
    },

    /// The conversation partner went away (agent closed, EOF on answers).
    #[error("conversation closed before authentication finished")]
    ConversationClosed,

    /// The helper was invoked by a caller not entitled to this escalation.
    #[error("helper privilege violation: {reason}")]
    PrivilegeViolation {
        /// What the invoker was not entitled to.
        reason: String,
    },

    /// The helper refused to talk to a terminal.
    #[error("helper must not run with a tty on stdin")]
    TtyRefused,

    /// The helper was given unusable arguments.
    #[error("bad helper invocation: {reason}")]
    BadInvocation {
        /// What was wrong.
        reason: String,
    },

    /// Persisting the resulting grant failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for GrantError {
    fn code(&self) -> &'static str {
        match self {
            Self::Protocol { .. } => "GRANT_PROTOCOL",
            Self::Spawn { .. } => "GRANT_SPAWN",
            Self::NoVerdict => "GRANT_NO_VERDICT",
            Self::Io { .. } => "GRANT_IO",
            Self::ConversationClosed => "GRANT_CONVERSATION_CLOSED",
            Self::PrivilegeViolation { .. } => "GRANT_PRIVILEGE_VIOLATION",
            Self::TtyRefused => "GRANT_TTY_REFUSED",
            Self::BadInvocation { .. } => "GRANT_BAD_INVOCATION",
            Self::Store(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Spawn { .. } | Self::Io { .. } | Self::NoVerdict | Self::ConversationClosed => {
                true
            }
            Self::Protocol { .. }
            | Self::PrivilegeViolation { .. }
            | Self::TtyRefused
            | Self::BadInvocation { .. } => false,
            Self::Store(e) => e.is_recoverable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permit_types::assert_error_code;

    #[test]
    fn codes_are_stable() {
        assert_error_code(
            &GrantError::Protocol { line: "HELLO".into() },
            "GRANT_PROTOCOL",
        );
        assert_error_code(&GrantError::TtyRefused, "GRANT_TTY_REFUSED");
        assert_error_code(
            &GrantError::PrivilegeViolation {
                reason: "not root".into(),
            },
            "GRANT_PRIVILEGE_VIOLATION",
        );
    }

    #[test]
    fn privilege_violations_are_terminal() {
        assert!(!GrantError::PrivilegeViolation {
            reason: "x".into()
        }
        .is_recoverable());
        assert!(GrantError::NoVerdict.is_recoverable());
    }
}
