//! Tracker error types.

use permit_types::ErrorCode;
use thiserror::Error;

/// Error resolving a caller or its session.
///
/// `SubjectVanished` is the normal transient case: the bus name lost its
/// owner or the process exited between the query and the credential read.
/// Callers must treat it as "try again" or "request aborted", never as a
/// denial.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// The bus name has no current owner, or its process exited mid-query.
    #[error("subject vanished: {0}")]
    SubjectVanished(String),

    /// The process exists but its credentials could not be read.
    #[error("cannot read credentials for pid {pid}")]
    CredentialsUnreadable {
        /// The pid whose credentials were unreadable.
        pid: u32,
    },
}

impl ErrorCode for TrackerError {
    fn code(&self) -> &'static str {
        match self {
            Self::SubjectVanished(_) => "TRACKER_SUBJECT_VANISHED",
            Self::CredentialsUnreadable { .. } => "TRACKER_CREDENTIALS_UNREADABLE",
        }
    }

    fn is_recoverable(&self) -> bool {
        // both are transient races against process / name lifetime
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permit_types::assert_error_codes;

    #[test]
    fn codes_follow_conventions() {
        assert_error_codes(
            &[
                TrackerError::SubjectVanished(":1.7".into()),
                TrackerError::CredentialsUnreadable { pid: 1 },
            ],
            "TRACKER_",
        );
    }

    #[test]
    fn all_errors_are_transient() {
        assert!(TrackerError::SubjectVanished(":1.7".into()).is_recoverable());
        assert!(TrackerError::CredentialsUnreadable { pid: 1 }.is_recoverable());
    }
}
