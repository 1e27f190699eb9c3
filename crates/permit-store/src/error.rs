//! Store error types.

use permit_types::ErrorCode;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from the authorization store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("store i/o failure at {path}: {source}")]
    Io {
        /// Path the operation touched.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Could not take the partition writer lock.
    #[error("could not lock partition at {path}: {source}")]
    Lock {
        /// The lock file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A grant record file exists but cannot be decoded.
    #[error("malformed grant record at {path}: {reason}")]
    MalformedRecord {
        /// The record file path.
        path: PathBuf,
        /// What failed to decode.
        reason: String,
    },

    /// Explicit grants can only be held by concrete users.
    #[error("cannot store a grant for non-user identity '{identity}'")]
    NonUserIdentity {
        /// The offending identity, in textual form.
        identity: String,
    },
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "STORE_IO",
            Self::Lock { .. } => "STORE_LOCK",
            Self::MalformedRecord { .. } => "STORE_MALFORMED_RECORD",
            Self::NonUserIdentity { .. } => "STORE_NON_USER_IDENTITY",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Lock { .. })
    }
}
