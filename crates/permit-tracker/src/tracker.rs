//! The caller tracker.

use crate::directory::{BusDirectory, SessionDirectory};
use crate::{TrackerError, TrackerEvent};
use parking_lot::RwLock;
use permit_types::{ProcessTable, SessionFacts, Subject};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Cached facts for one bus caller.
#[derive(Debug, Clone)]
struct CallerFacts {
    pid: u32,
    start_time: u64,
    uid: u32,
    session_id: Option<String>,
}

/// Resolves bus identities to subjects and sessions, with an invalidating
/// cache.
///
/// Resolution is lazy: the first `resolve` for a bus name queries the bus
/// directory for the owner's credentials, reads the process start time from
/// the process table, and caches the result. Two event streams invalidate
/// the cache: name-ownership changes evict caller entries, session-manager
/// changes re-derive or drop session facts.
///
/// Resolution fails explicitly — a name with no owner or a process that
/// exited mid-query is [`TrackerError::SubjectVanished`], a transient
/// condition, never a silent default and never a denial.
pub struct CallerTracker {
    bus: Arc<dyn BusDirectory>,
    sessions: Arc<dyn SessionDirectory>,
    processes: Arc<dyn ProcessTable>,
    callers: RwLock<HashMap<String, CallerFacts>>,
    facts: RwLock<HashMap<String, SessionFacts>>,
}

impl CallerTracker {
    /// Creates a tracker over the given directory seams.
    #[must_use]
    pub fn new(
        bus: Arc<dyn BusDirectory>,
        sessions: Arc<dyn SessionDirectory>,
        processes: Arc<dyn ProcessTable>,
    ) -> Self {
        Self {
            bus,
            sessions,
            processes,
            callers: RwLock::new(HashMap::new()),
            facts: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves a unique bus name to a process subject.
    ///
    /// # Errors
    ///
    /// [`TrackerError::SubjectVanished`] when the name has no owner or the
    /// owning process exited before its start time could be read.
    pub fn resolve(&self, bus_name: &str) -> Result<Subject, TrackerError> {
        if let Some(cached) = self.callers.read().get(bus_name) {
            // cheap validity check: the pid must still carry the same start time
            if self.processes.start_time_of(cached.pid) == Some(cached.start_time) {
                return Ok(Subject::Process {
                    pid: cached.pid,
                    start_time: cached.start_time,
                    uid: cached.uid,
                });
            }
        }

        let creds = self
            .bus
            .credentials_of(bus_name)
            .ok_or_else(|| TrackerError::SubjectVanished(bus_name.to_string()))?;

        let start_time = self
            .processes
            .start_time_of(creds.pid)
            .ok_or_else(|| TrackerError::SubjectVanished(bus_name.to_string()))?;

        let session_id = self.sessions.session_of_pid(creds.pid);
        debug!(
            bus_name,
            pid = creds.pid,
            uid = creds.uid,
            session = session_id.as_deref(),
            "resolved caller"
        );

        self.callers.write().insert(
            bus_name.to_string(),
            CallerFacts {
                pid: creds.pid,
                start_time,
                uid: creds.uid,
                session_id,
            },
        );

        Ok(Subject::Process {
            pid: creds.pid,
            start_time,
            uid: creds.uid,
        })
    }

    /// Resolves the session facts for a subject, if it has a session.
    ///
    /// Returns `None` both for subjects without a session and when the
    /// session manager no longer knows the session; the engine treats both
    /// the same way (degrade toward requiring authentication).
    pub fn resolve_session(&self, subject: &Subject) -> Option<SessionFacts> {
        let session_id = match subject {
            Subject::Session { session_id } => Some(session_id.clone()),
            Subject::Process { pid, .. } => self
                .callers
                .read()
                .values()
                .find(|c| c.pid == *pid)
                .and_then(|c| c.session_id.clone())
                .or_else(|| self.sessions.session_of_pid(*pid)),
            Subject::BusName { unique_name } => self
                .callers
                .read()
                .get(unique_name)
                .and_then(|c| c.session_id.clone()),
        }?;

        if let Some(cached) = self.facts.read().get(&session_id) {
            return Some(cached.clone());
        }

        let facts = self.sessions.facts_of(&session_id)?;
        self.facts.write().insert(session_id, facts.clone());
        Some(facts)
    }

    /// Applies an invalidation event from the bus or the session manager.
    pub fn on_change(&self, event: TrackerEvent) {
        match event {
            TrackerEvent::NameOwnerChanged { name, new_owner } => {
                if new_owner.is_none() {
                    if self.callers.write().remove(&name).is_some() {
                        debug!(bus_name = %name, "evicted caller: name lost its owner");
                    }
                } else {
                    // new owner means new process: the old facts are stale either way
                    self.callers.write().remove(&name);
                }
            }
            TrackerEvent::SessionChanged { session_id } => {
                match self.sessions.facts_of(&session_id) {
                    Some(fresh) => {
                        self.facts.write().insert(session_id, fresh);
                    }
                    None => {
                        warn!(session_id, "session changed but facts unavailable; dropping");
                        self.facts.write().remove(&session_id);
                    }
                }
            }
            TrackerEvent::SessionRemoved { session_id } => {
                self.facts.write().remove(&session_id);
                self.callers
                    .write()
                    .retain(|_, c| c.session_id.as_deref() != Some(session_id.as_str()));
                debug!(session_id, "session removed");
            }
        }
    }

    /// Number of cached callers (observability/tests).
    #[must_use]
    pub fn cached_callers(&self) -> usize {
        self.callers.read().len()
    }
}
