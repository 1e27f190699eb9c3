//! The authorization store facade.

use crate::partition::Partition;
use crate::record::{scope_from_path, GrantRecord};
use crate::rules::{RuleResult, RuleSet};
use crate::StoreError;
use parking_lot::RwLock;
use permit_types::{
    AuthorizationEntry, Identity, PartitionClass, ProcessTable, Scope, SessionFacts,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const SENTINEL_FILE: &str = ".changed";

/// The facts a lookup matches explicit grants against.
///
/// The engine fills this from the resolved subject: the holder uid always,
/// the process key and session id when known. Scopes whose key is absent
/// (a subject with no session cannot hold a session grant) are simply not
/// probed.
#[derive(Debug, Clone, Copy)]
pub struct GrantQuery<'a> {
    /// The subject's uid.
    pub uid: u32,
    /// The subject's process key (`pid`, `start_time`), when known.
    pub process: Option<(u32, u64)>,
    /// The subject's session, when it has one.
    pub session_id: Option<&'a str>,
    /// The action being decided.
    pub action_id: &'a str,
    /// Session facts for constraint matching; `None` for sessionless
    /// subjects.
    pub facts: Option<&'a SessionFacts>,
}

/// File-backed store of explicit authorization entries and rule overrides.
///
/// Two record partitions (ephemeral for process/session scopes, durable
/// for `Always`) plus the administrator rule files. All mutation goes
/// through per-partition advisory locks so the engine process and the
/// grant helper process can share the directories; lookups are lock-free
/// because record writes are atomic renames.
pub struct AuthorizationStore {
    ephemeral: Partition,
    durable: Partition,
    rules_root: PathBuf,
    rules: RwLock<RuleSet>,
    processes: Arc<dyn ProcessTable>,
}

impl AuthorizationStore {
    /// Opens a store over the given directories, creating them if needed,
    /// and loads the rule files.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when a partition directory cannot be created.
    pub fn open(
        ephemeral_root: impl Into<PathBuf>,
        durable_root: impl Into<PathBuf>,
        rules_root: impl Into<PathBuf>,
        processes: Arc<dyn ProcessTable>,
    ) -> Result<Self, StoreError> {
        let rules_root = rules_root.into();
        Ok(Self {
            ephemeral: Partition::open(ephemeral_root)?,
            durable: Partition::open(durable_root)?,
            rules: RwLock::new(RuleSet::load(&rules_root)),
            rules_root,
            processes,
        })
    }

    fn partition(&self, scope: &Scope) -> &Partition {
        match scope.partition_class() {
            PartitionClass::Ephemeral => &self.ephemeral,
            PartitionClass::Durable => &self.durable,
        }
    }

    /// Finds the explicit entries applicable to a query, narrowest scope
    /// first.
    ///
    /// Each candidate scope is probed by its record path. An entry is
    /// returned only if it is still live (process scopes are re-validated
    /// against the process table) and its constraint is satisfied by the
    /// query's session facts. Records whose process is gone are deleted on
    /// the way through.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] on filesystem failure other than absence.
    pub fn lookup(&self, query: &GrantQuery<'_>) -> Result<Vec<AuthorizationEntry>, StoreError> {
        let mut scopes = Vec::with_capacity(4);
        if let Some((pid, start_time)) = query.process {
            scopes.push(Scope::OneShotProcess { pid, start_time });
            scopes.push(Scope::Process { pid, start_time });
        }
        if let Some(session_id) = query.session_id {
            scopes.push(Scope::Session {
                session_id: session_id.to_string(),
            });
        }
        scopes.push(Scope::Always { uid: query.uid });

        let mut entries = Vec::new();
        for scope in scopes {
            let rel = scope.relative_path(query.uid, query.action_id);
            let partition = self.partition(&scope);
            let Some(record) = partition.read(&rel)? else {
                continue;
            };
            if record.action_id != query.action_id {
                warn!(rel, "record action id disagrees with its file name, skipping");
                continue;
            }
            if scope.is_expired(self.processes.as_ref()) {
                debug!(rel, "dropping grant for dead process");
                let _lock = partition.lock()?;
                partition.remove(&rel)?;
                continue;
            }
            if !record.constraint.satisfied_by(query.facts) {
                debug!(rel, constraint = %record.constraint, "constraint unsatisfied");
                continue;
            }
            entries.push(entry_from_record(query.uid, scope, record));
        }
        Ok(entries)
    }

    /// Persists an entry, overwriting any previous entry with the same key.
    ///
    /// # Errors
    ///
    /// [`StoreError::NonUserIdentity`] unless the holder is a concrete
    /// user; [`StoreError::Io`]/[`StoreError::Lock`] on filesystem failure.
    pub fn insert(
        &self,
        entry: &AuthorizationEntry,
        granting_uid: u32,
    ) -> Result<(), StoreError> {
        let uid = entry
            .storage_uid()
            .ok_or_else(|| StoreError::NonUserIdentity {
                identity: entry.identity.to_string(),
            })?;
        let record = GrantRecord {
            action_id: entry.action_id.clone(),
            created_at: entry.created_at,
            granting_uid,
            constraint: entry.constraint,
            negative: entry.negative,
        };
        let rel = entry.scope.relative_path(uid, &entry.action_id);
        let partition = self.partition(&entry.scope);
        let _lock = partition.lock()?;
        partition.write(&rel, &record)?;
        debug!(
            identity = %entry.identity,
            action_id = %entry.action_id,
            scope = %entry.scope,
            negative = entry.negative,
            "stored authorization entry"
        );
        Ok(())
    }

    /// Removes the entry with the given key; `Ok(false)` when none existed.
    ///
    /// # Errors
    ///
    /// [`StoreError::NonUserIdentity`] unless the holder is a concrete
    /// user; [`StoreError::Io`]/[`StoreError::Lock`] on filesystem failure.
    pub fn revoke(
        &self,
        identity: &Identity,
        action_id: &str,
        scope: &Scope,
    ) -> Result<bool, StoreError> {
        let uid = identity.uid().ok_or_else(|| StoreError::NonUserIdentity {
            identity: identity.to_string(),
        })?;
        let rel = scope.relative_path(uid, action_id);
        let partition = self.partition(scope);
        let _lock = partition.lock()?;
        partition.remove(&rel)
    }

    /// Removes a one-shot entry after its single authorizing use.
    ///
    /// Entries with any other scope are left alone and `Ok(false)` is
    /// returned.
    ///
    /// # Errors
    ///
    /// Filesystem failure while removing the record.
    pub fn consume(&self, entry: &AuthorizationEntry) -> Result<bool, StoreError> {
        if !entry.scope.is_one_shot() {
            return Ok(false);
        }
        let Some(uid) = entry.storage_uid() else {
            return Ok(false);
        };
        let rel = entry.scope.relative_path(uid, &entry.action_id);
        let _lock = self.ephemeral.lock()?;
        self.ephemeral.remove(&rel)
    }

    /// Lists every live entry held by a uid, across both partitions.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] on filesystem failure.
    pub fn list(&self, uid: u32) -> Result<Vec<AuthorizationEntry>, StoreError> {
        let mut out = Vec::new();
        for partition in [&self.ephemeral, &self.durable] {
            for (rel, record) in partition.scan()? {
                let Some((holder, scope)) = scope_from_path(&rel, &record.action_id) else {
                    warn!(rel, "record file name does not decode, skipping");
                    continue;
                };
                if holder != uid || scope.is_expired(self.processes.as_ref()) {
                    continue;
                }
                out.push(entry_from_record(holder, scope, record));
            }
        }
        out.sort_by_key(|e| (e.scope.narrowness(), e.action_id.clone()));
        Ok(out)
    }

    /// Drops every session-scoped entry for a closed session.
    ///
    /// Returns how many entries were removed.
    ///
    /// # Errors
    ///
    /// Filesystem failure while scanning or removing.
    pub fn purge_session(&self, session_id: &str) -> Result<usize, StoreError> {
        let _lock = self.ephemeral.lock()?;
        let mut removed = 0;
        for (rel, record) in self.ephemeral.scan()? {
            let Some((_, scope)) = scope_from_path(&rel, &record.action_id) else {
                continue;
            };
            if matches!(&scope, Scope::Session { session_id: s } if s == session_id)
                && self.ephemeral.remove(&rel)?
            {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(session_id, removed, "purged session grants");
        }
        Ok(removed)
    }

    /// Evaluates the administrator rule files for an identity set and
    /// action.
    #[must_use]
    pub fn rule_override(&self, candidates: &[Identity], action_id: &str) -> Option<RuleResult> {
        self.rules.read().evaluate(candidates, action_id)
    }

    /// Re-reads the rule files from disk.
    pub fn reload_rules(&self) {
        *self.rules.write() = RuleSet::load(&self.rules_root);
    }

    /// Touches the change sentinel so other store handles know to reload.
    ///
    /// The grant helper runs in its own process; after persisting a grant
    /// it marks the store changed, and the engine's handle polls
    /// [`changed_since`](Self::changed_since) to invalidate whatever it
    /// caches.
    ///
    /// # Errors
    ///
    /// [`StoreError::Io`] when the sentinel cannot be written.
    pub fn mark_changed(&self) -> Result<(), StoreError> {
        let path = self.sentinel_path();
        std::fs::write(&path, b"").map_err(|source| StoreError::Io { path, source })
    }

    /// Whether the sentinel has been touched after `since`.
    #[must_use]
    pub fn changed_since(&self, since: std::time::SystemTime) -> bool {
        std::fs::metadata(self.sentinel_path())
            .and_then(|m| m.modified())
            .map(|mtime| mtime > since)
            .unwrap_or(false)
    }

    fn sentinel_path(&self) -> PathBuf {
        self.durable.root().join(SENTINEL_FILE)
    }

    /// The rules root this store reads from.
    #[must_use]
    pub fn rules_root(&self) -> &Path {
        &self.rules_root
    }
}

fn entry_from_record(uid: u32, scope: Scope, record: GrantRecord) -> AuthorizationEntry {
    AuthorizationEntry {
        identity: Identity::UnixUser(uid),
        action_id: record.action_id,
        constraint: record.constraint,
        scope,
        created_at: record.created_at,
        negative: record.negative,
    }
}
