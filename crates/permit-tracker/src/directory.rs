//! Directory seams: the bus daemon and the session manager.
//!
//! Both services are external collaborators. The traits here are the whole
//! contract the tracker needs from them; production wiring implements them
//! over the message bus, and tests use the static in-memory versions.

use parking_lot::RwLock;
use permit_types::SessionFacts;
use std::collections::HashMap;

/// Credentials of the process owning a bus name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusCredentials {
    /// The owning process id.
    pub pid: u32,
    /// The owning uid.
    pub uid: u32,
}

/// The bus daemon's view of name ownership.
pub trait BusDirectory: Send + Sync {
    /// Credentials of the current owner of `unique_name`, or `None` when
    /// the name has no owner.
    fn credentials_of(&self, unique_name: &str) -> Option<BusCredentials>;
}

/// The session manager's view of sessions and seats.
pub trait SessionDirectory: Send + Sync {
    /// The session a process belongs to, if any.
    fn session_of_pid(&self, pid: u32) -> Option<String>;

    /// Current facts for a session, or `None` when the session is gone.
    fn facts_of(&self, session_id: &str) -> Option<SessionFacts>;
}

/// In-memory [`BusDirectory`] for tests and embedding.
#[derive(Debug, Default)]
pub struct StaticBusDirectory {
    names: RwLock<HashMap<String, BusCredentials>>,
}

impl StaticBusDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a name owner.
    pub fn set_owner(&self, unique_name: impl Into<String>, pid: u32, uid: u32) {
        self.names
            .write()
            .insert(unique_name.into(), BusCredentials { pid, uid });
    }

    /// Drops a name, as if its owner disconnected.
    pub fn drop_name(&self, unique_name: &str) {
        self.names.write().remove(unique_name);
    }
}

impl BusDirectory for StaticBusDirectory {
    fn credentials_of(&self, unique_name: &str) -> Option<BusCredentials> {
        self.names.read().get(unique_name).copied()
    }
}

/// In-memory [`SessionDirectory`] for tests and embedding.
#[derive(Debug, Default)]
pub struct StaticSessionDirectory {
    pid_sessions: RwLock<HashMap<u32, String>>,
    facts: RwLock<HashMap<String, SessionFacts>>,
}

impl StaticSessionDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates a pid with a session.
    pub fn set_pid_session(&self, pid: u32, session_id: impl Into<String>) {
        self.pid_sessions.write().insert(pid, session_id.into());
    }

    /// Registers or replaces session facts.
    pub fn set_facts(&self, facts: SessionFacts) {
        self.facts.write().insert(facts.session_id.clone(), facts);
    }

    /// Removes a session entirely.
    pub fn remove_session(&self, session_id: &str) {
        self.facts.write().remove(session_id);
        self.pid_sessions.write().retain(|_, s| s != session_id);
    }
}

impl SessionDirectory for StaticSessionDirectory {
    fn session_of_pid(&self, pid: u32) -> Option<String> {
        self.pid_sessions.read().get(&pid).cloned()
    }

    fn facts_of(&self, session_id: &str) -> Option<SessionFacts> {
        self.facts.read().get(session_id).cloned()
    }
}
