//! File-backed authorization store.
//!
//! Explicit grants and lockdowns are one file each; administrator rule
//! files override action defaults for identity classes. The layout:
//!
//! ```text
//!  ephemeral root (cleared at boot)        durable root
//!  ├── uid1000-pid-321@99-….grant          ├── uid1000/
//!  ├── uid1000-pid-oneshot-….grant         │   └── org.example.restart.grant
//!  ├── uid1000-session-c2-….grant          └── .changed          (sentinel)
//!  └── .lock                               rules root
//!                                          ├── 10-vendor.d/*.pkla
//!                                          └── 90-mandatory.d/*.pkla
//! ```
//!
//! Presence of a record file is what makes a grant exist: insertion writes
//! one file atomically, revocation unlinks it, and liveness of process
//! scopes is re-checked against the process table at every lookup instead
//! of being tracked eagerly.
//!
//! # Example
//!
//! ```no_run
//! use permit_store::{AuthorizationStore, GrantQuery};
//! use permit_types::{AuthorizationEntry, Constraint, Identity, Scope};
//! use std::sync::Arc;
//!
//! # fn run(table: Arc<dyn permit_types::ProcessTable>) -> Result<(), permit_store::StoreError> {
//! let store = AuthorizationStore::open(
//!     "/run/permit/grants",
//!     "/var/lib/permit/grants",
//!     "/etc/permit/rules.d",
//!     table,
//! )?;
//!
//! store.insert(
//!     &AuthorizationEntry::new(
//!         Identity::UnixUser(1000),
//!         "org.example.restart",
//!         Constraint::LOCAL_ACTIVE,
//!         Scope::Always { uid: 1000 },
//!         1_700_000_000,
//!     ),
//!     0,
//! )?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod error;
mod partition;
pub mod record;
pub mod rules;
mod store;

pub use error::StoreError;
pub use record::GrantRecord;
pub use rules::{RuleResult, RuleSet};
pub use store::{AuthorizationStore, GrantQuery};
