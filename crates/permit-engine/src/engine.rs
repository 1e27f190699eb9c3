//! The decision engine.

use crate::modules::{combine, DecisionModule, ModuleControl, ModuleEntry};
use crate::{ActionRegistry, AdminResolver, EngineError, IdentityDirectory};
use permit_store::{AuthorizationStore, GrantQuery};
use permit_tracker::CallerTracker;
use permit_types::{
    Action, AuthorizationEntry, Identity, ImplicitAuthorization, SessionFacts, Subject, Verdict,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// A subject reduced to the facts a decision needs.
#[derive(Debug, Clone)]
struct ResolvedSubject {
    uid: u32,
    process: Option<(u32, u64)>,
    facts: Option<SessionFacts>,
}

/// Combines implicit action policy, rule files, explicit grants and the
/// configured module stack into a [`Verdict`].
///
/// `decide` is a pure query with one sanctioned exception: a one-shot grant
/// that authorizes a call is consumed on the way out.
pub struct DecisionEngine {
    registry: Arc<ActionRegistry>,
    store: Arc<AuthorizationStore>,
    tracker: Arc<CallerTracker>,
    directory: Arc<dyn IdentityDirectory>,
    admin: AdminResolver,
    stack: Vec<ModuleEntry>,
}

impl DecisionEngine {
    /// Creates an engine with the default single local-authority module.
    #[must_use]
    pub fn new(
        registry: Arc<ActionRegistry>,
        store: Arc<AuthorizationStore>,
        tracker: Arc<CallerTracker>,
        directory: Arc<dyn IdentityDirectory>,
        admin: AdminResolver,
    ) -> Self {
        Self {
            registry,
            store,
            tracker,
            directory,
            admin,
            stack: ModuleEntry::default_stack(),
        }
    }

    /// Replaces the module stack.
    #[must_use]
    pub fn with_stack(mut self, stack: Vec<ModuleEntry>) -> Self {
        self.stack = stack;
        self
    }

    /// The action registry this engine consults.
    #[must_use]
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// The store this engine consults.
    #[must_use]
    pub fn store(&self) -> &AuthorizationStore {
        &self.store
    }

    /// Decides whether `subject` may perform `action_id`.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownAction`] for an unregistered action (distinct
    /// from a `NotAuthorized` verdict), [`EngineError::SubjectUnresolvable`]
    /// or a tracker error when the subject cannot be pinned to a uid, and
    /// store errors from grant lookup.
    pub fn decide(&self, subject: &Subject, action_id: &str) -> Result<Verdict, EngineError> {
        let resolved = self.resolve(subject)?;
        let action = self
            .registry
            .lookup(action_id)
            .ok_or_else(|| EngineError::UnknownAction {
                action_id: action_id.to_string(),
            })?;

        let (local_level, one_shot) = self.local_authority(&resolved, &action)?;

        let opinions: Vec<(ModuleControl, ImplicitAuthorization)> = self
            .stack
            .iter()
            .map(|entry| {
                let opinion = match &entry.module {
                    DecisionModule::LocalAuthority => local_level,
                    DecisionModule::Fixed(level) => *level,
                };
                (entry.control, opinion)
            })
            .collect();
        let combined = combine(opinions);

        let verdict = Verdict::from_implicit(combined);
        if verdict.is_authorized() {
            if let Some(entry) = one_shot {
                // the grant authorized this call; it is spent now
                self.store.consume(&entry)?;
            }
            debug!(subject = %subject, action_id, "authorized");
        } else {
            warn!(subject = %subject, action_id, verdict = %verdict, "not immediately authorized");
        }
        Ok(verdict)
    }

    /// The ordered identities that can satisfy an admin challenge for an
    /// action.
    ///
    /// # Errors
    ///
    /// [`EngineError::UnknownAction`] for an unregistered action.
    pub fn admin_identities(&self, action_id: &str) -> Result<Vec<Identity>, EngineError> {
        let action = self
            .registry
            .lookup(action_id)
            .ok_or_else(|| EngineError::UnknownAction {
                action_id: action_id.to_string(),
            })?;
        Ok(self.admin.admin_identities(&action))
    }

    /// The admin resolver, for callers that need membership checks.
    #[must_use]
    pub fn admin_resolver(&self) -> &AdminResolver {
        &self.admin
    }

    fn resolve(&self, subject: &Subject) -> Result<ResolvedSubject, EngineError> {
        match subject {
            Subject::Process {
                pid,
                start_time,
                uid,
            } => Ok(ResolvedSubject {
                uid: *uid,
                process: Some((*pid, *start_time)),
                facts: self.tracker.resolve_session(subject),
            }),
            Subject::BusName { unique_name } => {
                let process = self.tracker.resolve(unique_name)?;
                let facts = self.tracker.resolve_session(&process);
                let Subject::Process {
                    pid,
                    start_time,
                    uid,
                } = process
                else {
                    return Err(EngineError::SubjectUnresolvable {
                        subject: subject.to_string(),
                        reason: format!("'{unique_name}' did not resolve to a process"),
                    });
                };
                Ok(ResolvedSubject {
                    uid,
                    process: Some((pid, start_time)),
                    facts,
                })
            }
            Subject::Session { session_id } => {
                let facts = self.tracker.resolve_session(subject).ok_or_else(|| {
                    EngineError::SubjectUnresolvable {
                        subject: subject.to_string(),
                        reason: format!("session '{session_id}' has no resolvable facts"),
                    }
                })?;
                Ok(ResolvedSubject {
                    uid: facts.uid,
                    process: None,
                    facts: Some(facts),
                })
            }
        }
    }

    /// The local authority's opinion: implicit baseline, rule-file
    /// override, then explicit grants with lockdown precedence.
    ///
    /// Also returns the one-shot entry to consume if its grant ends up
    /// authorizing the call.
    fn local_authority(
        &self,
        resolved: &ResolvedSubject,
        action: &Action,
    ) -> Result<(ImplicitAuthorization, Option<AuthorizationEntry>), EngineError> {
        let facts = resolved.facts.as_ref();
        let mut level = action.implicit_for(facts.map(|f| f.is_active));

        let candidates = self.directory.identities_of(resolved.uid);
        if let Some(rule) = self.store.rule_override(&candidates, &action.id) {
            let override_level = match facts {
                Some(f) => rule.for_state(f.is_active),
                None => rule.any.is_known().then_some(rule.any),
            };
            if let Some(override_level) = override_level {
                debug!(
                    action_id = %action.id,
                    from = %level,
                    to = %override_level,
                    "rule file overrides implicit policy"
                );
                level = override_level;
            }
        }

        let entries = self.store.lookup(&GrantQuery {
            uid: resolved.uid,
            process: resolved.process,
            session_id: facts.map(|f| f.session_id.as_str()),
            action_id: &action.id,
            facts,
        })?;

        if let Some(lockdown) = entries.iter().find(|e| e.negative) {
            warn!(
                action_id = %action.id,
                scope = %lockdown.scope,
                "lockdown entry forces denial"
            );
            return Ok((ImplicitAuthorization::NotAuthorized, None));
        }
        if let Some(grant) = entries.first() {
            debug!(action_id = %action.id, scope = %grant.scope, "explicit grant applies");
            let one_shot = grant.scope.is_one_shot().then(|| grant.clone());
            return Ok((ImplicitAuthorization::Authorized, one_shot));
        }
        Ok((level, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AdminRule, StaticDirectory};
    use parking_lot::Mutex;
    use permit_tracker::{StaticBusDirectory, StaticSessionDirectory};
    use permit_types::{Constraint, ProcessTable, Scope};
    use std::collections::HashMap;
    use tempfile::TempDir;
    use ImplicitAuthorization::*;

    struct FakeTable(Mutex<HashMap<u32, u64>>);

    impl ProcessTable for FakeTable {
        fn start_time_of(&self, pid: u32) -> Option<u64> {
            self.0.lock().get(&pid).copied()
        }
    }

    struct Rig {
        _dir: TempDir,
        engine: DecisionEngine,
        store: Arc<AuthorizationStore>,
        sessions: Arc<StaticSessionDirectory>,
        bus: Arc<StaticBusDirectory>,
    }

    fn rig() -> Rig {
        let dir = TempDir::new().unwrap();
        let table = Arc::new(FakeTable(Mutex::new(HashMap::from([(42, 7777)]))));
        let store = Arc::new(
            AuthorizationStore::open(
                dir.path().join("run"),
                dir.path().join("lib"),
                dir.path().join("rules.d"),
                table.clone(),
            )
            .unwrap(),
        );
        let bus = Arc::new(StaticBusDirectory::new());
        let sessions = Arc::new(StaticSessionDirectory::new());
        let tracker = Arc::new(CallerTracker::new(bus.clone(), sessions.clone(), table));
        let directory = Arc::new(StaticDirectory::new());
        directory.set_groups(1000, vec![27]);

        let registry = Arc::new(ActionRegistry::new());
        registry.replace_all([
            Action::new("org.example.status", Authorized, Authorized, Authorized),
            Action::new("org.example.restart", NotAuthorized, AuthAdmin, AuthSelfKeep),
            Action::new("org.example.mount", AuthSelf, AuthSelf, Authorized),
        ]);

        let admin = AdminResolver::new(vec![AdminRule::Group(27)], directory.clone());
        let engine = DecisionEngine::new(registry, store.clone(), tracker, directory, admin);
        Rig {
            _dir: dir,
            engine,
            store,
            sessions,
            bus,
        }
    }

    fn active_session(rig: &Rig, session_id: &str) {
        rig.sessions.set_pid_session(42, session_id);
        rig.sessions.set_facts(SessionFacts {
            session_id: session_id.into(),
            seat_id: Some("seat0".into()),
            uid: 1000,
            is_local: true,
            is_active: true,
        });
    }

    fn inactive_session(rig: &Rig, session_id: &str) {
        rig.sessions.set_pid_session(42, session_id);
        rig.sessions.set_facts(SessionFacts {
            session_id: session_id.into(),
            seat_id: Some("seat0".into()),
            uid: 1000,
            is_local: true,
            is_active: false,
        });
    }

    fn subject() -> Subject {
        Subject::process(42, 7777, 1000).unwrap()
    }

    #[test]
    fn implicit_authorized_short_circuits() {
        let r = rig();
        active_session(&r, "c2");
        let verdict = r.engine.decide(&subject(), "org.example.status").unwrap();
        assert_eq!(verdict, Verdict::Authorized);
    }

    #[test]
    fn unknown_action_is_an_error_not_a_denial() {
        let r = rig();
        let err = r.engine.decide(&subject(), "org.example.vanish").unwrap_err();
        assert!(matches!(err, EngineError::UnknownAction { .. }));
    }

    #[test]
    fn inactive_session_with_auth_admin_challenges_for_admin() {
        let r = rig();
        inactive_session(&r, "c2");
        let verdict = r.engine.decide(&subject(), "org.example.restart").unwrap();
        assert_eq!(
            verdict,
            Verdict::Challenge {
                admin_required: true
            }
        );
    }

    #[test]
    fn no_session_uses_implicit_any() {
        let r = rig();
        // pid 42 has no session at all
        let verdict = r.engine.decide(&subject(), "org.example.restart").unwrap();
        assert_eq!(verdict, Verdict::NotAuthorized);
        let verdict = r.engine.decide(&subject(), "org.example.mount").unwrap();
        assert_eq!(
            verdict,
            Verdict::Challenge {
                admin_required: false
            }
        );
    }

    #[test]
    fn session_grant_flips_only_that_session() {
        let r = rig();
        inactive_session(&r, "c2");
        r.store
            .insert(
                &AuthorizationEntry::new(
                    Identity::UnixUser(1000),
                    "org.example.restart",
                    Constraint::NONE,
                    Scope::Session {
                        session_id: "c2".into(),
                    },
                    0,
                ),
                0,
            )
            .unwrap();

        let verdict = r.engine.decide(&subject(), "org.example.restart").unwrap();
        assert_eq!(verdict, Verdict::Authorized);

        // same uid, different session: back to the challenge
        inactive_session(&r, "c3");
        let verdict = r.engine.decide(&subject(), "org.example.restart").unwrap();
        assert_eq!(
            verdict,
            Verdict::Challenge {
                admin_required: true
            }
        );
    }

    #[test]
    fn lockdown_beats_narrower_positive_grant() {
        let r = rig();
        active_session(&r, "c2");
        r.store
            .insert(
                &AuthorizationEntry::new(
                    Identity::UnixUser(1000),
                    "org.example.status",
                    Constraint::NONE,
                    Scope::Session {
                        session_id: "c2".into(),
                    },
                    0,
                ),
                0,
            )
            .unwrap();
        r.store
            .insert(
                &AuthorizationEntry::new(
                    Identity::UnixUser(1000),
                    "org.example.status",
                    Constraint::NONE,
                    Scope::Always { uid: 1000 },
                    0,
                )
                .into_negative(),
                0,
            )
            .unwrap();

        let verdict = r.engine.decide(&subject(), "org.example.status").unwrap();
        assert_eq!(verdict, Verdict::NotAuthorized);
    }

    #[test]
    fn one_shot_grant_authorizes_exactly_once() {
        let r = rig();
        inactive_session(&r, "c2");
        r.store
            .insert(
                &AuthorizationEntry::new(
                    Identity::UnixUser(1000),
                    "org.example.restart",
                    Constraint::NONE,
                    Scope::OneShotProcess {
                        pid: 42,
                        start_time: 7777,
                    },
                    0,
                ),
                0,
            )
            .unwrap();

        assert_eq!(
            r.engine.decide(&subject(), "org.example.restart").unwrap(),
            Verdict::Authorized
        );
        assert_eq!(
            r.engine.decide(&subject(), "org.example.restart").unwrap(),
            Verdict::Challenge {
                admin_required: true
            }
        );
    }

    #[test]
    fn rule_file_overrides_implicit_policy() {
        let r = rig();
        inactive_session(&r, "c2");
        let rules_dir = r._dir.path().join("rules.d/50-local.d");
        std::fs::create_dir_all(&rules_dir).unwrap();
        std::fs::write(
            rules_dir.join("ops.pkla"),
            "[ops group may restart]\n\
             Identity=unix-group:27\n\
             Action=org.example.restart\n\
             ResultInactive=yes\n",
        )
        .unwrap();
        r.store.reload_rules();

        let verdict = r.engine.decide(&subject(), "org.example.restart").unwrap();
        assert_eq!(verdict, Verdict::Authorized);
    }

    #[test]
    fn advise_module_loosens_mandatory_floor() {
        let r = rig();
        inactive_session(&r, "c2");
        let engine = rigged_stack(
            r,
            vec![
                ModuleEntry {
                    control: ModuleControl::Mandatory,
                    module: DecisionModule::LocalAuthority,
                },
                ModuleEntry {
                    control: ModuleControl::Advise,
                    module: DecisionModule::Fixed(Authorized),
                },
            ],
        );
        let verdict = engine.decide(&subject(), "org.example.restart").unwrap();
        assert_eq!(verdict, Verdict::Authorized);
    }

    #[test]
    fn later_mandatory_module_overrides() {
        let r = rig();
        active_session(&r, "c2");
        let engine = rigged_stack(
            r,
            vec![
                ModuleEntry {
                    control: ModuleControl::Mandatory,
                    module: DecisionModule::LocalAuthority,
                },
                ModuleEntry {
                    control: ModuleControl::Mandatory,
                    module: DecisionModule::Fixed(NotAuthorized),
                },
            ],
        );
        let verdict = engine.decide(&subject(), "org.example.status").unwrap();
        assert_eq!(verdict, Verdict::NotAuthorized);
    }

    fn rigged_stack(r: Rig, stack: Vec<ModuleEntry>) -> DecisionEngine {
        // keep the tempdir alive for the engine's lifetime
        std::mem::forget(r._dir);
        r.engine.with_stack(stack)
    }

    #[test]
    fn bus_name_subject_resolves_through_tracker() {
        let r = rig();
        r.bus.set_owner(":1.9", 42, 1000);
        active_session(&r, "c2");
        let verdict = r
            .engine
            .decide(&Subject::bus_name(":1.9").unwrap(), "org.example.status")
            .unwrap();
        assert_eq!(verdict, Verdict::Authorized);
    }

    #[test]
    fn bus_name_with_dead_owner_is_an_error_not_a_panic() {
        let r = rig();
        // pid 99 is not in the process table, so the owner cannot be pinned
        r.bus.set_owner(":1.7", 99, 1000);
        let err = r
            .engine
            .decide(&Subject::bus_name(":1.7").unwrap(), "org.example.status")
            .unwrap_err();
        assert!(matches!(err, EngineError::Tracker(_)));
    }

    #[test]
    fn unresolvable_session_subject_fails_explicitly() {
        let r = rig();
        let err = r
            .engine
            .decide(&Subject::session("c9").unwrap(), "org.example.status")
            .unwrap_err();
        assert!(matches!(err, EngineError::SubjectUnresolvable { .. }));
    }

    #[test]
    fn admin_identities_for_action() {
        let r = rig();
        assert_eq!(
            r.engine.admin_identities("org.example.restart").unwrap(),
            vec![Identity::UnixGroup(27)]
        );
        assert!(matches!(
            r.engine.admin_identities("org.example.vanish"),
            Err(EngineError::UnknownAction { .. })
        ));
    }
}
