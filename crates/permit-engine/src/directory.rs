//! Identity directory: group and netgroup membership.
//!
//! The engine needs to know which group/netgroup identities a uid matches
//! when evaluating rule files and admin rules. The system directory (NSS)
//! answers that; tests use the static implementation.

use nix::unistd::{getgrouplist, Gid, Uid, User};
use parking_lot::RwLock;
use permit_types::Identity;
use std::collections::HashMap;
use std::ffi::{c_char, c_int, CString};
use tracing::warn;

// Not wrapped by nix; glibc and musl both export it.
extern "C" {
    fn innetgr(
        netgroup: *const c_char,
        host: *const c_char,
        user: *const c_char,
        domain: *const c_char,
    ) -> c_int;
}

/// Group and netgroup membership queries for a uid.
pub trait IdentityDirectory: Send + Sync {
    /// Gids of every group the uid belongs to, primary included.
    fn groups_of(&self, uid: u32) -> Vec<u32>;

    /// Netgroups from the watched set that the uid belongs to.
    fn netgroups_of(&self, uid: u32) -> Vec<String>;

    /// Every identity the uid matches: the user itself, its groups, its
    /// netgroups.
    fn identities_of(&self, uid: u32) -> Vec<Identity> {
        let mut out = vec![Identity::UnixUser(uid)];
        out.extend(self.groups_of(uid).into_iter().map(Identity::UnixGroup));
        out.extend(self.netgroups_of(uid).into_iter().map(Identity::UnixNetgroup));
        out
    }
}

/// NSS-backed directory.
///
/// Netgroup membership can only be tested, never enumerated, so the
/// directory carries a watch list of netgroup names (the ones referenced by
/// configuration) and probes each with `innetgr(3)`.
#[derive(Debug, Default)]
pub struct UnixDirectory {
    watched_netgroups: Vec<String>,
}

impl UnixDirectory {
    /// Creates a directory with no watched netgroups.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory probing the given netgroups.
    #[must_use]
    pub fn with_netgroups(watched_netgroups: Vec<String>) -> Self {
        Self { watched_netgroups }
    }

    fn user_of(uid: u32) -> Option<User> {
        match User::from_uid(Uid::from_raw(uid)) {
            Ok(user) => user,
            Err(e) => {
                warn!(uid, error = %e, "passwd lookup failed");
                None
            }
        }
    }
}

impl IdentityDirectory for UnixDirectory {
    fn groups_of(&self, uid: u32) -> Vec<u32> {
        let Some(user) = Self::user_of(uid) else {
            return Vec::new();
        };
        let Ok(name) = CString::new(user.name.as_str()) else {
            return Vec::new();
        };
        match getgrouplist(&name, user.gid) {
            Ok(gids) => gids.into_iter().map(Gid::as_raw).collect(),
            Err(e) => {
                warn!(uid, error = %e, "group list lookup failed");
                vec![user.gid.as_raw()]
            }
        }
    }

    fn netgroups_of(&self, uid: u32) -> Vec<String> {
        if self.watched_netgroups.is_empty() {
            return Vec::new();
        }
        let Some(user) = Self::user_of(uid) else {
            return Vec::new();
        };
        let Ok(name) = CString::new(user.name.as_str()) else {
            return Vec::new();
        };

        self.watched_netgroups
            .iter()
            .filter(|netgroup| {
                let Ok(ng) = CString::new(netgroup.as_str()) else {
                    return false;
                };
                // host and domain are wildcards: membership by user only
                // SAFETY: all three pointers are valid NUL-terminated strings
                // (or null for the wildcard positions) for the call duration.
                unsafe {
                    innetgr(
                        ng.as_ptr(),
                        std::ptr::null(),
                        name.as_ptr(),
                        std::ptr::null(),
                    ) == 1
                }
            })
            .cloned()
            .collect()
    }
}

/// In-memory [`IdentityDirectory`] for tests and embedding.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    groups: RwLock<HashMap<u32, Vec<u32>>>,
    netgroups: RwLock<HashMap<u32, Vec<String>>>,
}

impl StaticDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the groups a uid belongs to.
    pub fn set_groups(&self, uid: u32, gids: impl Into<Vec<u32>>) {
        self.groups.write().insert(uid, gids.into());
    }

    /// Adds a uid to a netgroup.
    pub fn add_netgroup(&self, uid: u32, netgroup: impl Into<String>) {
        self.netgroups
            .write()
            .entry(uid)
            .or_default()
            .push(netgroup.into());
    }
}

impl IdentityDirectory for StaticDirectory {
    fn groups_of(&self, uid: u32) -> Vec<u32> {
        self.groups.read().get(&uid).cloned().unwrap_or_default()
    }

    fn netgroups_of(&self, uid: u32) -> Vec<String> {
        self.netgroups.read().get(&uid).cloned().unwrap_or_default()
    }
}
