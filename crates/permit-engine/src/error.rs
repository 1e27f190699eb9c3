//! Engine error types.

use permit_store::StoreError;
use permit_tracker::TrackerError;
use permit_types::ErrorCode;
use thiserror::Error;

/// Errors from a decision call.
///
/// `UnknownAction` is deliberately an error, not a verdict: callers must be
/// able to tell "never heard of this action" from "denied".
#[derive(Debug, Error)]
pub enum EngineError {
    /// The action id is not in the registry.
    #[error("unknown action '{action_id}'")]
    UnknownAction {
        /// The unregistered id.
        action_id: String,
    },

    /// The subject could not be resolved to an owning identity.
    #[error("cannot resolve subject '{subject}': {reason}")]
    SubjectUnresolvable {
        /// The subject, in textual form.
        subject: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The tracker failed to resolve a bus caller.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// The authorization store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownAction { .. } => "ENGINE_UNKNOWN_ACTION",
            Self::SubjectUnresolvable { .. } => "ENGINE_SUBJECT_UNRESOLVABLE",
            Self::Tracker(e) => e.code(),
            Self::Store(e) => e.code(),
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::UnknownAction { .. } => false,
            Self::SubjectUnresolvable { .. } => true,
            Self::Tracker(e) => e.is_recoverable(),
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
            &EngineError::UnknownAction {
                action_id: "a.b".into(),
            },
            "ENGINE_UNKNOWN_ACTION",
        );
        assert_error_code(
            &EngineError::SubjectUnresolvable {
                subject: "session:c9".into(),
                reason: "no facts".into(),
            },
            "ENGINE_SUBJECT_UNRESOLVABLE",
        );
    }

    #[test]
    fn nested_errors_keep_their_codes() {
        let e = EngineError::Tracker(TrackerError::SubjectVanished(":1.4".into()));
        assert_eq!(e.code(), "TRACKER_SUBJECT_VANISHED");
        assert!(e.is_recoverable());
    }

    #[test]
    fn unknown_action_is_terminal() {
        assert!(!EngineError::UnknownAction {
            action_id: "a.b".into()
        }
        .is_recoverable());
    }
}
