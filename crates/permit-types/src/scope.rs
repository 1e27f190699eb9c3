//! Grant scopes: how long and how broadly a grant lives.

use crate::ProcessTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The storage partition class a scope maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionClass {
    /// Runtime partition, cleared at boot (process and session scopes).
    Ephemeral,
    /// Permanent per-uid partition (`Always` scope).
    Durable,
}

/// The lifetime/breadth class of a grant.
///
/// A scope determines both where the grant record is stored and when it
/// stops being valid:
///
/// | Scope | Partition | Expires |
/// |-------|-----------|---------|
/// | `OneShotProcess` | ephemeral | first use, or process death |
/// | `Process` | ephemeral | process death |
/// | `Session` | ephemeral | session end |
/// | `Always` | durable | explicit revocation only |
///
/// Process death is detected lazily at lookup time by re-reading the live
/// process table and comparing start times; there is no TTL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// Valid for a single authorization of one process.
    OneShotProcess {
        /// Process id.
        pid: u32,
        /// Kernel start time guarding against pid reuse.
        start_time: u64,
    },
    /// Valid for the lifetime of one process.
    Process {
        /// Process id.
        pid: u32,
        /// Kernel start time guarding against pid reuse.
        start_time: u64,
    },
    /// Valid for the lifetime of one login session.
    Session {
        /// Session id.
        session_id: String,
    },
    /// Valid until explicitly revoked.
    Always {
        /// The uid the permanent grant belongs to.
        uid: u32,
    },
}

impl Scope {
    /// The partition class this scope stores into.
    #[must_use]
    pub fn partition_class(&self) -> PartitionClass {
        match self {
            Self::OneShotProcess { .. } | Self::Process { .. } | Self::Session { .. } => {
                PartitionClass::Ephemeral
            }
            Self::Always { .. } => PartitionClass::Durable,
        }
    }

    /// Lookup priority: lower is narrower and consulted first.
    #[must_use]
    pub fn narrowness(&self) -> u8 {
        match self {
            Self::OneShotProcess { .. } => 0,
            Self::Process { .. } => 1,
            Self::Session { .. } => 2,
            Self::Always { .. } => 3,
        }
    }

    /// Returns `true` if this is a one-shot scope.
    #[must_use]
    pub fn is_one_shot(&self) -> bool {
        matches!(self, Self::OneShotProcess { .. })
    }

    /// The record file path for this scope, relative to its partition root.
    ///
    /// The file name *is* the entry key: inserting the same
    /// `(identity, action, scope)` twice overwrites the same file, which is
    /// what makes store writes idempotent and last-write-wins.
    #[must_use]
    pub fn relative_path(&self, uid: u32, action_id: &str) -> String {
        match self {
            Self::OneShotProcess { pid, start_time } => {
                format!("uid{uid}-pid-oneshot-{pid}@{start_time}-{action_id}.grant")
            }
            Self::Process { pid, start_time } => {
                format!("uid{uid}-pid-{pid}@{start_time}-{action_id}.grant")
            }
            Self::Session { session_id } => {
                format!("uid{uid}-session-{session_id}-{action_id}.grant")
            }
            Self::Always { uid } => format!("uid{uid}/{action_id}.grant"),
        }
    }

    /// Whether this scope has expired, checked against the live process table.
    ///
    /// Only process scopes can expire here; session scopes are removed by
    /// session-end events and `Always` never expires.
    #[must_use]
    pub fn is_expired(&self, table: &dyn ProcessTable) -> bool {
        match self {
            Self::OneShotProcess { pid, start_time } | Self::Process { pid, start_time } => {
                table.start_time_of(*pid) != Some(*start_time)
            }
            Self::Session { .. } | Self::Always { .. } => false,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneShotProcess { pid, start_time } => {
                write!(f, "one-shot-process:{pid}@{start_time}")
            }
            Self::Process { pid, start_time } => write!(f, "process:{pid}@{start_time}"),
            Self::Session { session_id } => write!(f, "session:{session_id}"),
            Self::Always { uid } => write!(f, "always:uid{uid}"),
        }
    }
}
