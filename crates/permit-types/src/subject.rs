//! Subjects: who is asking.
//!
//! A [`Subject`] is the entity being evaluated for permission: a concrete
//! process, a login session, or a transient message-bus endpoint that the
//! tracker resolves into one of the former.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The entity requesting permission to perform an action.
///
/// # PID reuse
///
/// A `Process` subject always carries the process start time read from the
/// kernel process table. A pid alone is ambiguous (pids are recycled), so a
/// process subject with an unresolved start time is invalid and is rejected
/// at construction — it is never defaulted.
///
/// # Example
///
/// ```
/// use permit_types::Subject;
///
/// let subject = Subject::process(4242, 1_234_567, 1000).unwrap();
/// assert_eq!(subject.uid(), Some(1000));
///
/// // A zero start time is a resolution failure, not a subject.
/// assert!(Subject::process(4242, 0, 1000).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    /// A live OS process.
    Process {
        /// Process id.
        pid: u32,
        /// Start time from the kernel process table (clock ticks since boot).
        start_time: u64,
        /// Owning uid.
        uid: u32,
    },
    /// A login session.
    Session {
        /// Session id from the session manager.
        session_id: String,
    },
    /// A unique message-bus name, not yet resolved to a process.
    BusName {
        /// The unique (not well-known) bus name.
        unique_name: String,
    },
}

/// Error constructing a [`Subject`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubjectError {
    /// A process subject was given without a kernel start time.
    #[error("process {pid} has no start time; refusing ambiguous subject")]
    MissingStartTime {
        /// The ambiguous pid.
        pid: u32,
    },
    /// A session or bus-name subject was given an empty identifier.
    #[error("empty subject identifier")]
    EmptyIdentifier,
}

impl Subject {
    /// Creates a process subject.
    ///
    /// # Errors
    ///
    /// Returns [`SubjectError::MissingStartTime`] when `start_time` is zero,
    /// which is what an unresolved read from the process table yields.
    pub fn process(pid: u32, start_time: u64, uid: u32) -> Result<Self, SubjectError> {
        if start_time == 0 {
            return Err(SubjectError::MissingStartTime { pid });
        }
        Ok(Self::Process {
            pid,
            start_time,
            uid,
        })
    }

    /// Creates a session subject.
    ///
    /// # Errors
    ///
    /// Returns [`SubjectError::EmptyIdentifier`] for an empty session id.
    pub fn session(session_id: impl Into<String>) -> Result<Self, SubjectError> {
        let session_id = session_id.into();
        if session_id.is_empty() {
            return Err(SubjectError::EmptyIdentifier);
        }
        Ok(Self::Session { session_id })
    }

    /// Creates a bus-name subject.
    ///
    /// # Errors
    ///
    /// Returns [`SubjectError::EmptyIdentifier`] for an empty name.
    pub fn bus_name(unique_name: impl Into<String>) -> Result<Self, SubjectError> {
        let unique_name = unique_name.into();
        if unique_name.is_empty() {
            return Err(SubjectError::EmptyIdentifier);
        }
        Ok(Self::BusName { unique_name })
    }

    /// The owning uid, when already known without tracker help.
    #[must_use]
    pub fn uid(&self) -> Option<u32> {
        match self {
            Self::Process { uid, .. } => Some(*uid),
            _ => None,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process {
                pid,
                start_time,
                uid,
            } => write!(f, "process:{pid}@{start_time}:uid{uid}"),
            Self::Session { session_id } => write!(f, "session:{session_id}"),
            Self::BusName { unique_name } => write!(f, "bus:{unique_name}"),
        }
    }
}

/// Locality and activity facts about a login session.
///
/// Derived by the tracker from the session/seat directory service, cached,
/// and invalidated on change events. When facts cannot be derived the engine
/// degrades both booleans to `false` — toward requiring authentication,
/// never toward granting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFacts {
    /// Session id.
    pub session_id: String,
    /// Seat id, when the session is attached to a physical seat.
    pub seat_id: Option<String>,
    /// The uid the session belongs to.
    pub uid: u32,
    /// Whether the session is on a local (console) seat.
    pub is_local: bool,
    /// Whether the session is the active one on its seat.
    pub is_active: bool,
}

impl SessionFacts {
    /// Facts for a session that could not be resolved: not local, not active.
    #[must_use]
    pub fn degraded(session_id: impl Into<String>, uid: u32) -> Self {
        Self {
            session_id: session_id.into(),
            seat_id: None,
            uid,
            is_local: false,
            is_active: false,
        }
    }
}
