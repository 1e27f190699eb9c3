//! Explicit authorization entries.

use crate::{Constraint, Identity, Scope};
use serde::{Deserialize, Serialize};

/// A persisted explicit grant (or lockdown) for one identity and action.
///
/// Entries are created only by the grant protocol or administrative tooling
/// and deleted only by explicit revocation or natural scope expiry. A
/// `negative` entry is a lockdown: when it matches, it forces
/// `NotAuthorized` regardless of the action's implicit policy or any
/// positive grant of equal or broader scope.
///
/// # Example
///
/// ```
/// use permit_types::{AuthorizationEntry, Constraint, Identity, Scope};
///
/// let entry = AuthorizationEntry::new(
///     Identity::UnixUser(1000),
///     "org.example.restart",
///     Constraint::NONE,
///     Scope::Session { session_id: "c2".into() },
///     1_700_000_000,
/// );
/// assert!(!entry.negative);
/// let lockdown = entry.clone().into_negative();
/// assert!(lockdown.negative);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationEntry {
    /// Who holds the authorization.
    pub identity: Identity,
    /// The action the authorization is for.
    pub action_id: String,
    /// Locality/activity requirement for the entry to apply.
    pub constraint: Constraint,
    /// Lifetime/breadth of the entry.
    pub scope: Scope,
    /// Creation time, unix seconds (audit metadata).
    pub created_at: i64,
    /// Lockdown flag: a matching negative entry forces denial.
    pub negative: bool,
}

impl AuthorizationEntry {
    /// Creates a positive entry.
    #[must_use]
    pub fn new(
        identity: Identity,
        action_id: impl Into<String>,
        constraint: Constraint,
        scope: Scope,
        created_at: i64,
    ) -> Self {
        Self {
            identity,
            action_id: action_id.into(),
            constraint,
            scope,
            created_at,
            negative: false,
        }
    }

    /// Turns this entry into a lockdown entry.
    #[must_use]
    pub fn into_negative(mut self) -> Self {
        self.negative = true;
        self
    }

    /// The uid this entry is keyed under in the store.
    ///
    /// Explicit grants are always held by a concrete user; group and
    /// netgroup authorizations come from rule files, not grant records.
    #[must_use]
    pub fn storage_uid(&self) -> Option<u32> {
        self.identity.uid()
    }
}
