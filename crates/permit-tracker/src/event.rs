//! Invalidation events.

/// A change pushed into the tracker by the bus or the session manager.
///
/// The transport plumbing (D-Bus match rules, logind signals) lives outside
/// this crate; whatever listens to it translates raw signals into these
/// events and feeds them to [`CallerTracker::on_change`](crate::CallerTracker::on_change).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// A bus name changed owner. `new_owner: None` means the name was lost.
    NameOwnerChanged {
        /// The unique bus name affected.
        name: String,
        /// The new owner, or `None` when the name is gone.
        new_owner: Option<String>,
    },
    /// A session's activity or seat changed; cached facts are stale.
    SessionChanged {
        /// The affected session id.
        session_id: String,
    },
    /// A session ended; cached facts and session-scoped state are invalid.
    SessionRemoved {
        /// The removed session id.
        session_id: String,
    },
}
